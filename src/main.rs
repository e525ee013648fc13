use std::io::{IsTerminal, Read};
use std::process;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use rusml::session::Session;
use rusml::shell;

fn main() -> anyhow::Result<()> {
    let mut session = Session::new();

    if !std::io::stdin().is_terminal() {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        let result = shell::run(&mut session, &input);
        print!("{}", result.output);
        process::exit(result.exit_code);
    }

    let mut editor = DefaultEditor::new()?;
    let mut exit_code = 0;
    loop {
        match editor.readline("- ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(trimmed);
                let input = if trimmed.ends_with(';') {
                    trimmed.to_string()
                } else {
                    format!("{trimmed};")
                };
                let result = shell::run(&mut session, &input);
                print!("{}", result.output);
                if result.exit_code != 0 {
                    exit_code = result.exit_code;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{e}");
                exit_code = 1;
                break;
            }
        }
    }
    process::exit(exit_code);
}
