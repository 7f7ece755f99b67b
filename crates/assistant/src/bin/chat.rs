use std::io::{self, BufRead, Write};

use assistant::{logging, Config, Turn};

fn main() -> anyhow::Result<()> {
    logging::init("warn");

    // If a prompt is provided on the command line, run a single-shot chat and exit.
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let config = Config::from_env()?;
    let service = assistant::load_service(&config)?;

    if !args.is_empty() {
        let prompt = args.join(" ");
        let reply = service.respond_turns(&prompt, &[])?;
        println!("> {}", prompt);
        println!("{}", reply);
        return Ok(());
    }

    // Interactive REPL; the conversation lives only as long as the process.
    println!("Interactive chat: type 'quit' or Ctrl-D to exit, 'reset' to start over");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut turns: Vec<Turn> = Vec::new();
    for line in stdin.lock().lines() {
        let line = line?;
        let s = line.trim();
        if s.is_empty() {
            continue;
        }
        if s.eq_ignore_ascii_case("quit") || s.eq_ignore_ascii_case("exit") {
            println!("Bye");
            break;
        }
        if s.eq_ignore_ascii_case("reset") {
            turns.clear();
            println!("(history cleared)");
            continue;
        }

        match service.respond_turns(s, &turns) {
            Ok(reply) => {
                println!("AI: {}", reply);
                turns.push(Turn::new(s, reply));
            }
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                eprintln!("error: {}", e);
            }
        }
        stdout.flush()?;
    }

    Ok(())
}
