//
// command.rs
//
// Console command tokenizer.
//

/// VIN preset 1: Renault Laguna II 2002
pub const VIN_PRESET_1: &str = "VF1BG0A0524085422";
/// VIN preset 2: Ford Fiesta 2011
pub const VIN_PRESET_2: &str = "3FADP4FJ2BM113913";

/// One parsed console command, consumed by the command applier.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetSpeed(i64),
    SetEngine(f64),
    SetAir(i64),
    SetVin(String),
    SetVinPreset(u8),
    Start,
    Stop,
    /// Input that matched no recognized field; triggers the usage hint
    Invalid,
}

impl Command {
    /// Tokenize one console line. Keywords are case-insensitive and
    /// whitespace-delimited.
    ///
    /// Returns `None` for a recognized field carrying an unparseable value:
    /// the field is skipped silently and keeps its previous value. Anything
    /// not matching a recognized field yields `Command::Invalid`.
    pub fn parse(line: &str) -> Option<Command> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next()?.to_lowercase();

        match keyword.as_str() {
            "speed" => tokens.next()?.parse().ok().map(Command::SetSpeed),
            "engine" => tokens.next()?.parse().ok().map(Command::SetEngine),
            "air" => tokens.next()?.parse().ok().map(Command::SetAir),
            "vin" => match tokens.next() {
                Some(word) if word.eq_ignore_ascii_case("preset") => {
                    match tokens.next().and_then(|n| n.parse().ok()) {
                        Some(n @ (1 | 2)) => Some(Command::SetVinPreset(n)),
                        _ => Some(Command::Invalid),
                    }
                }
                Some(vin) => Some(Command::SetVin(vin.to_uppercase())),
                None => Some(Command::Invalid),
            },
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            _ => Some(Command::Invalid),
        }
    }
}
