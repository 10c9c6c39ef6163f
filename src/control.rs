use crate::schema::{ControlMessage, StartCommand};

/// Parse and validate one start command line from the control surface.
///
/// The `Err` text is what goes back in `StartResponse.error`.
pub fn parse_start_command(line: &str) -> Result<StartCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Err("No start command received".to_string());
    }

    let ControlMessage::StartMeetBot(cmd) = serde_json::from_str::<ControlMessage>(line)
        .map_err(|e| format!("Invalid start command: {}", e))?;

    cmd.validate()?;
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_command() {
        let cmd = parse_start_command(
            r#"  {"type":"START_MEET_BOT","meetUrl":"https://meet.google.com/abc","interviewId":null,"backendBaseUrl":"http://localhost:8000"}  "#,
        )
        .unwrap();
        assert_eq!(cmd.meet_url(), "https://meet.google.com/abc");
        assert_eq!(cmd.interview_id(), None);
    }

    #[test]
    fn empty_input_is_reported() {
        assert_eq!(
            parse_start_command("\n").unwrap_err(),
            "No start command received"
        );
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = parse_start_command("{not json").unwrap_err();
        assert!(err.starts_with("Invalid start command"));
    }

    #[test]
    fn missing_url_is_reported() {
        let err = parse_start_command(r#"{"type":"START_MEET_BOT","meetUrl":""}"#).unwrap_err();
        assert_eq!(err, "Please enter a Google Meet URL");
    }
}
