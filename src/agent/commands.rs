#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Clean,
    Debug,
}

impl ControlCommand {
    /// Only a line that is exactly the command counts. Surrounding line
    /// terminators are ignored; any other text makes it ordinary content.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim_end_matches(['\r', '\n']) {
            "/clean" => Some(Self::Clean),
            "/debug" => Some(Self::Debug),
            _ => None,
        }
    }
}
