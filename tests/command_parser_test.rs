// Tests for free-text command parsing precedence
use lumenframe::command::{Action, DEFAULT_COMMAND, ParsedCommand, parse_command};
use proptest::prelude::*;

#[test]
fn test_each_keyword_maps_to_its_command() {
    let cases = [
        ("brighten", ParsedCommand::new(Action::Brighten, 50)),
        ("darken", ParsedCommand::new(Action::Darken, 50)),
        ("saturate", ParsedCommand::new(Action::Saturate, 50)),
        ("desaturate", ParsedCommand::new(Action::Desaturate, 50)),
        ("blur", ParsedCommand::new(Action::Blur, 10)),
        ("sharpen", ParsedCommand::new(Action::Sharpen, 50)),
        ("smooth", ParsedCommand::new(Action::Blur, 5)),
        ("remove", ParsedCommand::new(Action::Remove, 70)),
    ];

    for (text, expected) in cases {
        assert_eq!(parse_command(text), expected, "command: {text}");
    }
}

#[test]
fn test_matching_is_case_insensitive() {
    assert_eq!(parse_command("DARKEN the sky"), ParsedCommand::new(Action::Darken, 50));
    assert_eq!(parse_command("Smooth Skin"), ParsedCommand::new(Action::Blur, 5));
}

#[test]
fn test_earlier_rule_wins() {
    assert_eq!(
        parse_command("blur and brighten"),
        ParsedCommand::new(Action::Brighten, 50)
    );
    assert_eq!(
        parse_command("sharpen then remove the logo"),
        ParsedCommand::new(Action::Sharpen, 50)
    );
    assert_eq!(
        parse_command("smooth the blur"),
        ParsedCommand::new(Action::Blur, 10)
    );
}

#[test]
fn test_desaturate_is_not_read_as_saturate() {
    assert_eq!(
        parse_command("desaturate the photo"),
        ParsedCommand::new(Action::Desaturate, 50)
    );
    assert_eq!(
        parse_command("desaturate the sky, saturate the grass"),
        ParsedCommand::new(Action::Saturate, 50)
    );
}

#[test]
fn test_no_keyword_falls_back_to_default() {
    assert_eq!(parse_command("make it pop"), DEFAULT_COMMAND);
    assert_eq!(parse_command(""), ParsedCommand::new(Action::Brighten, 30));
}

proptest! {
    #[test]
    fn any_text_containing_brighten_is_brighten_50(
        prefix in "[a-zA-Z0-9 ]{0,24}",
        suffix in "[a-zA-Z0-9 ]{0,24}",
    ) {
        let command = format!("{prefix}brighten{suffix}");
        prop_assert_eq!(parse_command(&command), ParsedCommand::new(Action::Brighten, 50));
    }

    #[test]
    fn parsing_never_panics_and_strength_is_bounded(text in ".{0,64}") {
        let parsed = parse_command(&text);
        prop_assert!(parsed.strength.get() <= 100);
    }
}
