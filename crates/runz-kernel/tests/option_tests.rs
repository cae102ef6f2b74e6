//! Option/syntax engine tests.

use runz_kernel::options::{
    syntax, OptionCandidate, OptionParser, OptionReaders, OptionSyntax, RecognizedOptions,
};
use runz_types::{RunError, RunResult};

/// Most tests record which reader fired into this log.
type Log = Vec<String>;

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn parse_with(
    readers: OptionReaders<Log>,
    args: &[&str],
) -> RunResult<(RecognizedOptions, Log)> {
    let mut log = Log::new();
    let recognized = OptionParser::new(readers).parse(&mut log, &argv(args))?;
    Ok((recognized, log))
}

// =============================================================================
// Basic recognition
// =============================================================================

#[test]
fn long_option_consumes_values_until_next_option() {
    let mut readers = OptionReaders::new();
    readers
        .read("--name", |log: &mut Log, ctx| {
            log.push(format!("name={:?}", ctx.values()));
            Ok(())
        })
        .read("--flag", |log: &mut Log, ctx| {
            ctx.accept();
            log.push("flag".to_string());
            Ok(())
        });
    let (recognized, log) =
        parse_with(readers, &["--name", "v1", "v2", "--flag"]).unwrap();
    assert_eq!(log, [r#"name=["v1", "v2"]"#, "flag"]);
    assert_eq!(
        recognized.get("--name"),
        Some(&["v1".to_string(), "v2".to_string()][..])
    );
    assert_eq!(recognized.get("--flag"), Some(&[][..]));
}

#[test]
fn long_option_with_bound_value() {
    let mut readers = OptionReaders::new();
    readers.read("--name", |log: &mut Log, ctx| {
        log.push(format!("{:?}", ctx.values()));
        Ok(())
    });
    let (recognized, log) = parse_with(readers, &["--name=v"]).unwrap();
    assert_eq!(log, [r#"["v"]"#]);
    assert_eq!(recognized.get("--name"), Some(&["v".to_string()][..]));
}

#[test]
fn values_up_to_caps_consumption() {
    let mut readers = OptionReaders::new();
    readers
        .read("--one", |log: &mut Log, ctx| {
            log.push(format!("one={:?}", ctx.values_up_to(1)));
            Ok(())
        })
        .read("*", |log: &mut Log, ctx| {
            ctx.accept();
            log.push(format!("pos:{}", ctx.name()));
            Ok(())
        });
    let (_, log) = parse_with(readers, &["--one", "a", "b"]).unwrap();
    assert_eq!(log, [r#"one=["a"]"#, "pos:b"]);
}

#[test]
fn rest_consumes_option_like_tokens_too() {
    let mut readers = OptionReaders::new();
    readers.read("--then", |log: &mut Log, ctx| {
        log.push(format!("{:?}", ctx.rest()));
        Ok(())
    });
    let (_, log) = parse_with(readers, &["--then", "cmd", "--deep"]).unwrap();
    assert_eq!(log, [r#"["cmd", "--deep"]"#]);
}

#[test]
fn unknown_option_is_an_error() {
    let readers: OptionReaders<Log> = OptionReaders::new();
    let err = parse_with(readers, &["--nope"]).unwrap_err();
    assert!(matches!(err, RunError::UnknownOption { name } if name == "--nope"));
}

#[test]
fn repeated_options_append_values() {
    let mut readers = OptionReaders::new();
    readers.read("--add", |_: &mut Log, ctx| {
        ctx.values_up_to(1);
        Ok(())
    });
    let (recognized, _) = parse_with(readers, &["--add", "1", "--add", "2"]).unwrap();
    assert_eq!(
        recognized.get("--add"),
        Some(&["1".to_string(), "2".to_string()][..])
    );
}

// =============================================================================
// Short-option disambiguation
// =============================================================================

#[test]
fn longest_exact_short_wins() {
    let mut readers = OptionReaders::new();
    readers
        .read("-test", |log: &mut Log, ctx| {
            ctx.accept();
            log.push("-test".to_string());
            Ok(())
        })
        .read("-t*", |log: &mut Log, ctx| {
            log.push(format!("-t*={:?}", ctx.values()));
            Ok(())
        })
        .read("-t", |log: &mut Log, ctx| {
            ctx.accept();
            log.push("-t".to_string());
            Ok(())
        });
    let (_, log) = parse_with(readers, &["-test"]).unwrap();
    assert_eq!(log, ["-test"]);
}

#[test]
fn one_letter_prefix_takes_the_remainder_as_parameter() {
    let mut readers = OptionReaders::new();
    readers.read("-t*", |log: &mut Log, ctx| {
        let name = ctx.name().to_string();
        log.push(format!("{}={:?}", name, ctx.values()));
        Ok(())
    });
    let (recognized, log) = parse_with(readers, &["-test"]).unwrap();
    assert_eq!(log, [r#"-t=["est"]"#]);
    assert_eq!(recognized.get("-t"), Some(&["est".to_string()][..]));
}

#[test]
fn cluster_reprocesses_the_remainder() {
    let mut readers = OptionReaders::new();
    for flag in ["-t", "-e", "-s"] {
        readers.read(flag, move |log: &mut Log, ctx| {
            ctx.accept();
            log.push(ctx.name().to_string());
            Ok(())
        });
    }
    let (_, log) = parse_with(readers, &["-tes"]).unwrap();
    assert_eq!(log, ["-t", "-e", "-s"]);
}

// =============================================================================
// Replacement retry
// =============================================================================

/// The spec's option-engine scenario: a syntax replacing `--test` with a
/// retried `--replaced`, with readers `{--test: rest, --*: values}`.
#[test]
fn replacement_retry_preempts_exact_readers() {
    let replace = |args: &[String]| -> Vec<OptionCandidate> {
        if args[0] == "--test" {
            vec![OptionCandidate::new("--replaced").retrying()]
        } else {
            Vec::new()
        }
    };
    let syntaxes: Vec<Box<dyn OptionSyntax>> = vec![
        Box::new(replace),
        Box::new(syntax::long_options as fn(&[String]) -> Vec<OptionCandidate>),
    ];
    let mut readers = OptionReaders::new();
    readers
        .read("--test", |log: &mut Log, ctx| {
            log.push(format!("test={:?}", ctx.rest()));
            Ok(())
        })
        .read("--*", |log: &mut Log, ctx| {
            let name = ctx.name().to_string();
            log.push(format!("{}={:?}", name, ctx.values()));
            Ok(())
        });

    let mut log = Log::new();
    let recognized = OptionParser::with_syntaxes(syntaxes, readers)
        .parse(&mut log, &argv(&["--test", "1", "2"]))
        .unwrap();

    assert_eq!(log, ["--replaced=[]"]);
    assert_eq!(recognized.get("--replaced"), Some(&[][..]));
    assert!(!recognized.contains("--test"));
}

#[test]
fn retry_is_refused_after_first_recognition() {
    // The same replacement, but a recognized option comes first: the
    // replacement candidate may no longer retry, so `--test` falls through
    // to its exact reader.
    let replace = |args: &[String]| -> Vec<OptionCandidate> {
        if args[0] == "--test" {
            vec![OptionCandidate::new("--replaced").retrying()]
        } else {
            Vec::new()
        }
    };
    let syntaxes: Vec<Box<dyn OptionSyntax>> = vec![
        Box::new(replace),
        Box::new(syntax::long_options as fn(&[String]) -> Vec<OptionCandidate>),
    ];
    let mut readers = OptionReaders::new();
    readers
        .read("--first", |log: &mut Log, ctx| {
            ctx.accept();
            log.push("first".to_string());
            Ok(())
        })
        .read("--test", |log: &mut Log, ctx| {
            ctx.accept();
            log.push("test".to_string());
            Ok(())
        });

    let mut log = Log::new();
    OptionParser::with_syntaxes(syntaxes, readers)
        .parse(&mut log, &argv(&["--first", "--test"]))
        .unwrap();
    assert_eq!(log, ["first", "test"]);
}

// =============================================================================
// Deferral
// =============================================================================

#[test]
fn deferred_callbacks_run_in_registration_order_with_final_values() {
    let mut readers = OptionReaders::new();
    readers
        .read("--a", |log: &mut Log, ctx| {
            ctx.values_up_to(1);
            ctx.defer(Box::new(|log: &mut Log, ctx| {
                log.push(format!("deferred a={:?}", ctx.values()));
                Ok(())
            }));
            log.push("read a".to_string());
            Ok(())
        })
        .read("--b", |log: &mut Log, ctx| {
            ctx.accept();
            ctx.defer(Box::new(|log: &mut Log, ctx| {
                ctx.accept();
                log.push("deferred b".to_string());
                Ok(())
            }));
            log.push("read b".to_string());
            Ok(())
        });
    let (_, log) = parse_with(readers, &["--a", "v", "--b"]).unwrap();
    assert_eq!(log, ["read a", "read b", r#"deferred a=["v"]"#, "deferred b"]);
}

#[test]
fn uncompleted_deferral_is_an_unknown_option() {
    let mut readers = OptionReaders::new();
    readers.read("--later", |_: &mut Log, ctx| {
        // Defer without ever reading: recognition never completes.
        ctx.defer(Box::new(|_: &mut Log, _ctx| Ok(())));
        Ok(())
    });
    let err = parse_with(readers, &["--later"]).unwrap_err();
    assert!(matches!(err, RunError::UnknownOption { name } if name == "--later"));
}

#[test]
fn deferral_completed_in_second_pass() {
    let mut readers = OptionReaders::new();
    readers.read("--later", |log: &mut Log, ctx| {
        ctx.defer(Box::new(|log: &mut Log, ctx| {
            log.push(format!("later={:?}", ctx.values()));
            Ok(())
        }));
        log.push("deferred".to_string());
        Ok(())
    });
    let (_, log) = parse_with(readers, &["--later"]).unwrap();
    assert_eq!(log, ["deferred", "later=[]"]);
}

// =============================================================================
// Layers and wildcards
// =============================================================================

#[test]
fn readers_for_a_name_run_in_layer_order_until_recognition() {
    let mut readers = OptionReaders::new();
    readers.read("--x", |log: &mut Log, _ctx| {
        // Does not recognize: the next layer gets its turn.
        log.push("first layer".to_string());
        Ok(())
    });
    readers.layer().read("--x", |log: &mut Log, ctx| {
        ctx.accept();
        log.push("second layer".to_string());
        Ok(())
    });
    let (_, log) = parse_with(readers, &["--x"]).unwrap();
    assert_eq!(log, ["first layer", "second layer"]);
}

#[test]
fn wildcards_catch_by_name_class() {
    let mut readers = OptionReaders::new();
    readers
        .read("--*", |log: &mut Log, ctx| {
            ctx.accept();
            log.push(format!("long:{}", ctx.name()));
            Ok(())
        })
        .read("-*", |log: &mut Log, ctx| {
            ctx.accept();
            log.push(format!("short:{}", ctx.name()));
            Ok(())
        })
        .read("*", |log: &mut Log, ctx| {
            ctx.accept();
            log.push(format!("pos:{}", ctx.name()));
            Ok(())
        });
    let (_, log) = parse_with(readers, &["--long", "-s", "word"]).unwrap();
    assert_eq!(log, ["long:--long", "short:-s", "pos:word"]);
}

#[test]
fn exact_reader_beats_wildcard() {
    let mut readers = OptionReaders::new();
    readers
        .read("--known", |log: &mut Log, ctx| {
            ctx.accept();
            log.push("exact".to_string());
            Ok(())
        })
        .read("--*", |log: &mut Log, ctx| {
            ctx.accept();
            log.push("wildcard".to_string());
            Ok(())
        });
    let (_, log) = parse_with(readers, &["--known"]).unwrap();
    assert_eq!(log, ["exact"]);
}
