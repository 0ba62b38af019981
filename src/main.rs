use std::io::{self, Read};
use std::process::ExitCode;

use toil::{Interpreter, Value, init_tracing};

#[derive(Debug, Default)]
struct Options {
    show_tokens: bool,
    show_ast: bool,
    path: Option<String>,
}

fn print_usage() {
    eprintln!("Usage: toil [options] [FILE]");
    eprintln!();
    eprintln!("Runs FILE, or standard input when FILE is missing or `-`.");
    eprintln!("An integer result becomes the exit status.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --tokens     Print the token stream before running");
    eprintln!("  --ast        Print the parsed expression before running");
    eprintln!("  -h, --help   Show this message");
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Option<Options>, String> {
    let mut options = Options::default();
    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--tokens" => options.show_tokens = true,
            "--ast" => options.show_ast = true,
            "-" if options.path.is_none() => options.path = Some(arg),
            flag if flag.starts_with('-') => return Err(format!("unknown option `{}`", flag)),
            _ if options.path.is_none() => options.path = Some(arg),
            _ => return Err(format!("unexpected argument `{}`", arg)),
        }
    }
    Ok(Some(options))
}

// Returns the display name used in error reports along with the text.
fn read_source(path: Option<&str>) -> io::Result<(String, String)> {
    match path {
        None | Some("-") => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(("<stdin>".to_string(), source))
        }
        Some(path) => Ok((path.to_string(), std::fs::read_to_string(path)?)),
    }
}

fn report<E: std::fmt::Display>(err: &E, printed: io::Result<()>) {
    if printed.is_err() {
        eprintln!("{}", err);
    }
}

fn main() -> ExitCode {
    init_tracing();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("error: {}", message);
            print_usage();
            return ExitCode::from(2);
        }
    };

    let (name, source) = match read_source(options.path.as_deref()) {
        Ok(read) => read,
        Err(err) => {
            eprintln!(
                "error: cannot read {}: {}",
                options.path.as_deref().unwrap_or("standard input"),
                err
            );
            return ExitCode::from(2);
        }
    };

    let interpreter = Interpreter::new();

    if options.show_tokens {
        match interpreter.tokenize(&source) {
            Ok(tokens) => {
                for token in tokens {
                    println!("{:?}", token);
                }
            }
            Err(err) => {
                report(&err, err.pretty_print(&name, &source));
                return ExitCode::FAILURE;
            }
        }
    }

    let ast = match interpreter.parse(&source) {
        Ok(ast) => ast,
        Err(err) => {
            report(&err, err.pretty_print(&name, &source));
            return ExitCode::FAILURE;
        }
    };
    if options.show_ast {
        println!("{}", ast);
    }

    match interpreter.evaluate(&ast) {
        // Exit statuses only keep the low 8 bits
        Ok(Value::Integer(code)) => ExitCode::from(code as u8),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, err.pretty_print(&name, &source));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args_flags_and_path() {
        let options = parse_args(args(&["--ast", "prog.toil", "--tokens"]))
            .unwrap()
            .unwrap();
        assert!(options.show_ast);
        assert!(options.show_tokens);
        assert_eq!(options.path.as_deref(), Some("prog.toil"));
    }

    #[test]
    fn test_parse_args_stdin() {
        let options = parse_args(args(&[])).unwrap().unwrap();
        assert_eq!(options.path, None);
        let options = parse_args(args(&["-"])).unwrap().unwrap();
        assert_eq!(options.path.as_deref(), Some("-"));
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["a.toil", "b.toil"])).is_err());
        assert!(parse_args(args(&["--help"])).unwrap().is_none());
    }
}
