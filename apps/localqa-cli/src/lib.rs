//! Read-eval loop behind the `localqa` binary.
//!
//! Kept separate from `main` so the loop can be driven with in-memory
//! input and output.

use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::Result;
use localqa_core::traits::TokenSink;
use localqa_rag::{AskOptions, QueryService};
use tokio::runtime::Runtime;

pub const PROMPT: &str = "\nEnter a query: ";

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplOptions {
    pub hide_source: bool,
    pub mute_stream: bool,
    pub top_k: Option<usize>,
}

/// Answer one question and print it with its sources.
pub fn answer_one<W: Write + Send>(rt: &Runtime, service: &QueryService, question: &str, opts: &ReplOptions, out: &mut W) -> Result<()> {
    let ask = AskOptions { k: opts.top_k, hide_sources: opts.hide_source };
    let start = Instant::now();
    let answer = if opts.mute_stream {
        rt.block_on(service.ask(question, ask, None))?
    } else {
        let mut sink = |token: &str| {
            // A closed stdout must not abort generation.
            let _ = out.write_all(token.as_bytes());
            let _ = out.flush();
        };
        rt.block_on(service.ask(question, ask, Some(&mut sink as TokenSink<'_>)))?
    };
    let took = start.elapsed().as_secs_f64();

    writeln!(out, "\n\n> Question:")?;
    writeln!(out, "{question}")?;
    writeln!(out, "\n> Answer (took {took:.2} s.):")?;
    writeln!(out, "{}", answer.text)?;
    for chunk in &answer.sources {
        writeln!(out, "\n> {}:", chunk.source.path)?;
        writeln!(out, "{}", chunk.text)?;
    }
    out.flush()?;
    Ok(())
}

/// Prompt until `exit` or end of input. Blank lines re-prompt; a failed
/// question is reported and the loop continues.
pub fn run_repl<R: BufRead, W: Write + Send>(rt: &Runtime, service: &QueryService, opts: &ReplOptions, mut input: R, out: &mut W) -> Result<()> {
    let mut line = String::new();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim_end_matches(['\r', '\n']);
        if query == "exit" {
            break;
        }
        if query.trim().is_empty() {
            continue;
        }
        if let Err(e) = answer_one(rt, service, query, opts, out) {
            writeln!(out, "\n> Error: {e}")?;
        }
    }
    Ok(())
}
