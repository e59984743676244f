//! Integration tests for the target command protocol.
//!
//! Covers the `+`/`-`/`=` grammar, field bounds, and the order in which
//! validation errors are reported.

use assert_matches::assert_matches;
use speedbump::command::{self, Command, TargetSpec};
use speedbump::config::{self, Config};
use speedbump::{Error, TargetKey};

fn parse(line: &str) -> Result<Command, Error> {
    Command::parse_line(line, &Config::default())
}

fn add(path: &str, symbol: &str, delay_ns: Option<u64>, pid_filter: Option<u32>) -> Command {
    Command::Add(TargetSpec {
        key: TargetKey::new(path, symbol),
        delay_ns,
        pid_filter,
    })
}

// =============================================================================
// Add Command Tests
// =============================================================================

#[test]
fn test_add_without_delay() {
    assert_eq!(
        parse("+/usr/bin/app:main"),
        Ok(add("/usr/bin/app", "main", None, None))
    );
}

#[test]
fn test_add_with_delay_and_pid() {
    assert_eq!(
        parse("+/a:b 5000 pid=42\n"),
        Ok(add("/a", "b", Some(5000), Some(42)))
    );
}

#[test]
fn test_add_strips_line_endings() {
    assert_eq!(parse("+/a:b\n"), Ok(add("/a", "b", None, None)));
    assert_eq!(parse("+/a:b\r\n"), Ok(add("/a", "b", None, None)));
    assert_eq!(parse("+/a:b 100\r\n"), Ok(add("/a", "b", Some(100), None)));
}

#[test]
fn test_add_maximum_delay_is_accepted() {
    let line = format!("+/a:b {}", config::MAX_DELAY_NS);
    assert_eq!(parse(&line), Ok(add("/a", "b", Some(config::MAX_DELAY_NS), None)));
}

#[test]
fn test_add_symbol_may_start_with_underscore() {
    assert_eq!(parse("+/a:_start"), Ok(add("/a", "_start", None, None)));
}

// =============================================================================
// Remove And Update Command Tests
// =============================================================================

#[test]
fn test_remove_one() {
    assert_eq!(
        parse("-/usr/bin/app:main\n"),
        Ok(Command::Remove(TargetKey::new("/usr/bin/app", "main")))
    );
}

#[test]
fn test_remove_all() {
    assert_eq!(parse("-*"), Ok(Command::RemoveAll));
    assert_eq!(parse("-*\n"), Ok(Command::RemoveAll));
}

#[test]
fn test_remove_all_rejects_carriage_return() {
    assert_eq!(parse("-*\r\n"), Err(Error::InvalidArgument));
    assert_eq!(parse("-*\r"), Err(Error::InvalidArgument));
    assert_eq!(parse("-* "), Err(Error::InvalidArgument));
}

#[test]
fn test_remove_requires_separator() {
    assert_eq!(parse("-/usr/bin/app"), Err(Error::InvalidArgument));
}

#[test]
fn test_update_with_delay() {
    assert_eq!(
        parse("=/usr/bin/app:main 9999"),
        Ok(Command::Update(TargetSpec {
            key: TargetKey::new("/usr/bin/app", "main"),
            delay_ns: Some(9999),
            pid_filter: None,
        }))
    );
}

#[test]
fn test_update_pid_only() {
    let Ok(Command::Update(spec)) = parse("=/a:b pid=100") else {
        panic!("expected update");
    };
    assert_eq!(spec.delay_ns, None);
    assert_eq!(spec.pid_filter, Some(100));
}

// =============================================================================
// Rejection Tests
// =============================================================================

#[test]
fn test_empty_and_oversized_lines() {
    assert_eq!(parse(""), Err(Error::InvalidArgument));

    let long = format!("+/a:{}", "s".repeat(config::MAX_LINE_LEN));
    assert_eq!(parse(&long), Err(Error::InvalidArgument));
}

#[test]
fn test_unknown_operator() {
    assert_eq!(parse("*/a:b"), Err(Error::InvalidArgument));
    assert_eq!(parse("/a:b"), Err(Error::InvalidArgument));
    assert_eq!(parse("é/a:b"), Err(Error::InvalidArgument));
}

#[test]
fn test_missing_separator() {
    assert_eq!(parse("+/usr/bin/app"), Err(Error::InvalidArgument));
}

#[test]
fn test_relative_path() {
    assert_eq!(parse("+usr/bin/app:main"), Err(Error::InvalidArgument));
}

#[test]
fn test_path_length_bound() {
    assert_eq!(parse("+:main"), Err(Error::NameTooLong));

    let longest = format!("/{}", "p".repeat(config::MAX_PATH_LEN - 2));
    assert_matches!(parse(&format!("+{}:main", longest)), Ok(Command::Add(_)));

    let too_long = format!("/{}", "p".repeat(config::MAX_PATH_LEN - 1));
    assert_eq!(
        parse(&format!("+{}:main", too_long)),
        Err(Error::NameTooLong)
    );
}

#[test]
fn test_symbol_length_bound() {
    assert_eq!(parse("+/a:"), Err(Error::NameTooLong));
    assert_eq!(parse("+/a: 100"), Err(Error::NameTooLong));

    let longest = "s".repeat(config::MAX_SYMBOL_LEN - 1);
    assert_matches!(parse(&format!("+/a:{}", longest)), Ok(Command::Add(_)));

    let too_long = "s".repeat(config::MAX_SYMBOL_LEN);
    assert_eq!(parse(&format!("+/a:{}", too_long)), Err(Error::NameTooLong));
}

#[test]
fn test_symbol_start_character() {
    assert_eq!(parse("+/a:1abc"), Err(Error::InvalidArgument));
    assert_eq!(parse("+/a:.text"), Err(Error::InvalidArgument));
}

#[test]
fn test_delay_errors() {
    assert_eq!(parse("+/a:b abc"), Err(Error::InvalidArgument));
    assert_eq!(parse("+/a:b -5"), Err(Error::InvalidArgument));
    assert_eq!(
        parse(&format!("+/a:b {}", config::MAX_DELAY_NS + 1)),
        Err(Error::OutOfRange)
    );
    assert_eq!(
        parse("+/a:b 99999999999999999999999"),
        Err(Error::OutOfRange)
    );
}

#[test]
fn test_pid_errors() {
    assert_eq!(parse("+/a:b pid=-1"), Err(Error::InvalidArgument));
    assert_eq!(parse("+/a:b pid=abc"), Err(Error::InvalidArgument));
    assert_eq!(parse("+/a:b 100 pid="), Err(Error::InvalidArgument));
}

#[test]
fn test_validation_order() {
    // Path length is checked before the leading slash.
    let relative = "p".repeat(config::MAX_PATH_LEN);
    assert_eq!(parse(&format!("+{}:main", relative)), Err(Error::NameTooLong));

    // Delay range is checked before the symbol's first character.
    assert_eq!(parse("+/a:1bad 99999999999"), Err(Error::OutOfRange));

    // pid= is checked before the delay.
    assert_eq!(parse("+/a:b abc pid=-1"), Err(Error::InvalidArgument));
    assert_eq!(
        parse("+/a:b 99999999999 pid=x"),
        Err(Error::InvalidArgument)
    );
}

// =============================================================================
// Custom Limits Tests
// =============================================================================

#[test]
fn test_custom_limits() {
    let config = Config {
        max_delay_ns: 1_000,
        max_line_len: 16,
        ..Config::default()
    };

    assert_eq!(
        Command::parse_line("+/a:b 1000", &config),
        Ok(add("/a", "b", Some(1_000), None))
    );
    assert_eq!(
        Command::parse_line("+/a:b 1001", &config),
        Err(Error::OutOfRange)
    );
    assert_eq!(
        Command::parse_line("+/a/b/c/d/e/f:main", &config),
        Err(Error::InvalidArgument)
    );
}

#[test]
fn test_parse_delay_helper() {
    let config = Config::default();
    assert_eq!(command::parse_delay("0", &config), Ok(0));
    assert_eq!(command::parse_delay("", &config), Err(Error::InvalidArgument));
    assert_eq!(command::strip_line_end("42\r\n"), "42");
}

// =============================================================================
// Display Tests
// =============================================================================

#[test]
fn test_display_is_parseable() {
    let commands = [
        add("/usr/bin/app", "main", None, None),
        add("/a", "b", Some(5000), Some(42)),
        add("/a", "b", None, Some(7)),
        Command::Remove(TargetKey::new("/a", "b")),
        Command::RemoveAll,
    ];
    for cmd in commands {
        assert_eq!(parse(&cmd.to_string()), Ok(cmd));
    }
}
