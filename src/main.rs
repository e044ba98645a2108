use anyhow::{Context, Result};
use clap::Parser;
use mips_pipe_rs::{assemble, mem_dump, reg_dump, AssembleOption, Object, Simulator};

/// MIPS-like five-stage pipeline simulator written in rust
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// input assembly file path (empty program when omitted)
    input: Option<String>,
    /// print the assembled listing before simulation
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        // diagnostics go to stdout, like the per-cycle trace
        println!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let obj = match &args.input {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("could not read file `{}`", path))?;
            let obj = assemble(&content, AssembleOption::default().set_verbose(args.verbose))?;
            println!("Loaded {} instructions from {}.", obj.words.len(), path);
            obj
        }
        None => Object::default(),
    };
    if args.verbose {
        print!("{}", obj);
    }

    println!();
    println!("--- Starting Simulation ---");
    let mut pipe = Simulator::new(&obj.words, true);
    while !pipe.is_terminate() {
        pipe.step();
    }

    println!();
    println!("--- Simulation Ended after {} cycles ---", pipe.cycle_count());
    reg_dump(pipe.registers(), pipe.program_counter());
    mem_dump(pipe.mem());
    Ok(())
}
