pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Reads command input from `--input <file.json>`, falling back to piped
/// stdin. `what` names the input in the error when neither is given.
pub fn read_input<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        file::read_json(path)
    } else if let Some(data) = stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err(format!("--input <file.json> or stdin required for {what}").into())
    }
}
