//! Command-line shell.
//!
//! Usage:
//!   jsh                         # interactive shell
//!   jsh <file.js>               # run a file line by line, then exit
//!   jsh -e "code"               # evaluate code, then exit

use std::cell::RefCell;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing_subscriber::EnvFilter;

use jsh::repl::{ReplOptions, Session, SHELL_STACK_SIZE};

#[derive(Parser, Debug)]
#[command(name = "jsh", version, about = "Interactive JavaScript shell")]
struct Args {
    /// Script to run line by line before exiting
    script: Option<PathBuf>,

    /// Evaluate CODE and exit
    #[arg(short, long, value_name = "CODE")]
    eval: Option<String>,

    /// Time limit for one command, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 10_000)]
    timeout: u64,

    /// No banner and no prompts
    #[arg(short, long)]
    quiet: bool,

    /// Start without the standard global objects
    #[arg(long)]
    no_builtins: bool,
}

impl From<&Args> for ReplOptions {
    fn from(args: &Args) -> Self {
        ReplOptions::default()
            .with_timeout(Duration::from_millis(args.timeout))
            .with_quiet(args.quiet)
            .with_builtins(!args.no_builtins)
    }
}

struct ShellHelper {
    session: Rc<RefCell<Session>>,
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let mut session = match self.session.try_borrow_mut() {
            Ok(s) => s,
            Err(_) => return Ok((pos, vec![])),
        };
        let found = session.complete(line, pos);
        let start = if line[..pos].ends_with(found.filter.as_str()) {
            pos - found.filter.len()
        } else {
            pos
        };
        let pairs = found
            .candidates
            .into_iter()
            .map(|c| Pair {
                display: c.clone(),
                replacement: c,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() || line.trim().is_empty() {
            return None;
        }
        self.session.try_borrow_mut().ok()?.preview(line, pos)
    }
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

fn print_help() {
    println!(".help           Show this help");
    println!(".exit           Leave the shell");
    println!(".reset          Forget all bindings and history");
    println!(".history        List the commands of this session");
    println!(".load <file>    Run a file line by line");
    println!(".save <file>    Write the successful commands to a file");
    println!(".clear          Clear the screen");
    println!();
    println!("Ctrl-C cancels a running command or discards unfinished input.");
    println!("The last result is available as `ans`.");
}

enum Flow {
    Continue,
    Exit,
}

fn meta_command(
    line: &str,
    session: &Rc<RefCell<Session>>,
    rl: &mut Editor<ShellHelper, DefaultHistory>,
) -> Result<Flow> {
    let mut words = line.trim().splitn(2, char::is_whitespace);
    let command = words.next().unwrap_or_default();
    let argument = words.next().map(str::trim).unwrap_or_default();
    match command {
        ".help" => print_help(),
        ".exit" => return Ok(Flow::Exit),
        ".reset" => match session.borrow_mut().reset() {
            Ok(()) => println!("Session reset."),
            Err(e) => println!("{}", e.report()),
        },
        ".history" => {
            for entry in session.borrow().history() {
                let mark = if entry.succeeded { ' ' } else { '!' };
                println!("{:>4}{} {}", entry.sequence_id, mark, entry.raw_text);
            }
        }
        ".load" if !argument.is_empty() => {
            let mut session = session.borrow_mut();
            match session.load(argument.as_ref()) {
                Ok(output) => print_lines(output),
                Err(e) => println!("{}", e.report()),
            }
        }
        ".save" if !argument.is_empty() => match session.borrow().save(argument.as_ref()) {
            Ok(()) => println!("Session saved to {}", argument),
            Err(e) => println!("{}", e.report()),
        },
        ".clear" => rl.clear_screen()?,
        _ => println!("Invalid command {}; type .help for a list", line.trim()),
    }
    Ok(Flow::Continue)
}

fn interactive(session: Session) -> Result<i32> {
    let quiet = session.options().quiet;
    let session = Rc::new(RefCell::new(session));
    let mut rl: Editor<ShellHelper, DefaultHistory> =
        Editor::new().context("cannot start the line editor")?;
    rl.set_helper(Some(ShellHelper {
        session: session.clone(),
    }));
    if !quiet {
        println!(
            "jsh {} - type .help for commands",
            env!("CARGO_PKG_VERSION")
        );
    }
    loop {
        let prompt = if quiet {
            String::new()
        } else {
            session.borrow().prompt()
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let continuing = session.borrow().is_continuing();
                if !continuing && line.trim_start().starts_with('.') {
                    match meta_command(&line, &session, &mut rl)? {
                        Flow::Continue => continue,
                        Flow::Exit => break,
                    }
                }
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                let mut session = session.borrow_mut();
                print_lines(session.process_line(&line));
                print_lines(session.wait_for_command());
            }
            Err(ReadlineError::Interrupted) => {
                print_lines(session.borrow_mut().interrupt());
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(0)
}

fn run(args: Args) -> Result<i32> {
    let mut session = Session::new(ReplOptions::from(&args));
    let interrupt = session.interrupt_handle();
    ctrlc::set_handler(move || interrupt.store(true, Ordering::SeqCst))
        .context("cannot install the Ctrl-C handler")?;

    if let Some(code) = &args.eval {
        for line in code.lines() {
            print_lines(session.process_line(line));
            print_lines(session.wait_for_command());
            if session.last_failed() {
                return Ok(1);
            }
        }
        print_lines(session.run_until_idle());
        return Ok(if session.last_failed() { 1 } else { 0 });
    }
    if let Some(script) = &args.script {
        let output = session
            .load(script)
            .map_err(|e| anyhow!(e.to_string()))?;
        print_lines(output);
        print_lines(session.run_until_idle());
        return Ok(if session.last_failed() { 1 } else { 0 });
    }
    interactive(session)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let worker = thread::Builder::new()
        .name("jsh".to_string())
        .stack_size(SHELL_STACK_SIZE)
        .spawn(move || run(args))
        .context("cannot start the shell thread")?;
    let code = worker
        .join()
        .map_err(|_| anyhow!("the shell thread panicked"))??;
    process::exit(code)
}
