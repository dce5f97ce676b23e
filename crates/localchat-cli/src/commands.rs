use std::path::Path;

pub const HELP_TEXT: &str = "\
Type a message and press enter to send it.

  /new               start a new thread
  /list              list threads (the active one is marked with *)
  /switch <n>        make thread n active
  /delete <n>        delete thread n
  /rename <title>    rename the active thread
  /attach <file>...  attach documents to the active thread
  /errors            show captured warnings and errors
  /help              show this help
  /quit              exit";

/// One line of REPL input
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Submit(String),
    New,
    List,
    /// 1-based position in `/list`
    Switch(usize),
    Delete(usize),
    Rename(String),
    /// Display names of the attached files
    Attach(Vec<String>),
    Errors,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return ReplCommand::Submit(line.to_string());
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        match name {
            "new" => ReplCommand::New,
            "list" | "ls" => ReplCommand::List,
            "switch" => parse_index(args, "/switch").map_or_else(ReplCommand::Invalid, ReplCommand::Switch),
            "delete" => parse_index(args, "/delete").map_or_else(ReplCommand::Invalid, ReplCommand::Delete),
            "rename" if args.is_empty() => ReplCommand::Invalid("usage: /rename <title>".into()),
            "rename" => ReplCommand::Rename(args.to_string()),
            "attach" if args.is_empty() => ReplCommand::Invalid("usage: /attach <file>...".into()),
            "attach" => ReplCommand::Attach(args.split_whitespace().map(display_name).collect()),
            "errors" => ReplCommand::Errors,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            other => ReplCommand::Invalid(format!("unknown command /{other}, try /help")),
        }
    }
}

fn parse_index(args: &str, command: &str) -> Result<usize, String> {
    match args.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("usage: {command} <n>, where n is a number from /list")),
    }
}

/// File name without its directories
fn display_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
