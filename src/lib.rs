//
// lib.rs
//
// cansim: a CAN bus car simulator answering OBD-II requests.
//
pub mod command;
pub mod console;
pub mod drivers;
pub mod format;
pub mod frame;
pub mod generator;
pub mod responder;
pub mod router;
pub mod state;

use std::str::FromStr;

use clap::Parser;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CansimParseErrors {
    #[error("Invalid device options")]
    InvalidDriver,
}

/// CAN driver options
#[derive(Debug, Clone, PartialEq)]
pub enum DriverOpts {
    /// SocketCAN driver. Options: interface
    SocketCan(String),
}

impl FromStr for DriverOpts {
    type Err = CansimParseErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = Regex::new(r"([\w]+):\/\/([\w]+)").unwrap();

        // Attempt to match the specified driver
        // This takes the form:
        //   - socketcan://vcan0
        if let Some(caps) = re.captures(s) {
            let (_, [driver, opts]) = caps.extract();

            match driver {
                "socketcan" => Ok(DriverOpts::SocketCan(opts.to_string())),
                _ => Err(CansimParseErrors::InvalidDriver),
            }
        }
        else {
            // If the expression doesn't match, just return the string as a SocketCAN driver option
            Ok(DriverOpts::SocketCan(s.to_string()))
        }
    }
}

/// cansim emulates a vehicle ECU answering OBD-II queries over CAN
#[derive(Parser, Debug)]
#[command(version, about = "CAN bus car simulator")]
pub struct Args {
    /// The CAN interface to answer on (with driver options if applicable)
    #[arg(value_parser = clap::value_parser!(DriverOpts))]
    pub interface: DriverOpts,
    /// Cadence of the synthetic request generator in milliseconds, used
    /// when no transport is present
    #[arg(short = 'g', long = "gen-period", default_value = "10")]
    pub gen_period: u64,
}
