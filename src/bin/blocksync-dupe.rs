use blocksync_dupe::{DupOptions, Orchestrator, ReportSink, TextReportSink};
#[cfg(feature = "json")]
use blocksync_dupe::JsonReportSink;

use getopts::Options;
use std::env;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};

static BREAK_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Parses a `[bkmg]`-suffixed human size (`k`/`m`/`g` = 1024^{1,2,3}) into
/// a raw byte count. No suffix means bytes.
fn parse_human_size(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (digits, mult) = match s.as_bytes()[s.len() - 1] {
        b'k' | b'K' => (&s[..s.len() - 1], 1024u64),
        b'm' | b'M' => (&s[..s.len() - 1], 1024 * 1024),
        b'g' | b'G' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        b'b' | b'B' => (&s[..s.len() - 1], 1),
        _ => (s, 1),
    };
    digits.parse::<u64>().ok().map(|n| n * mult)
}

/// Parses a `-c` argument's leading `+`/`>`/`-`/`<`/`=` sign plus size
/// into the matching `DupOptions` field.
fn apply_size_condition(opt: &str, dopt: &mut DupOptions) -> Result<(), String> {
    let mut chars = opt.chars();
    let sign = chars.next().ok_or_else(|| "empty -c argument".to_string())?;
    let rest = chars.as_str();
    let size = parse_human_size(rest).ok_or_else(|| format!("invalid size in -c argument '{opt}'"))?;
    match sign {
        '+' | '>' => dopt.size_min = size,
        '-' | '<' => dopt.size_max = size,
        '=' => dopt.size_eq = size,
        other => return Err(format!("invalid -c condition '{other}' (expected one of + > - < =)")),
    }
    Ok(())
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {program} [options] directory [directory..]");
    print!("{}", opts.usage(&brief));
}

fn main() -> ExitCode {
    let mut opts = Options::new();
    opts.optmulti("c", "", "size condition: [+|>]N sets a minimum, [-|<]N a maximum, =N an exact size (N takes a k/m/g/b suffix)", "[+-=]N[bkmg]");
    opts.optflag("i", "", "force interactive progress output");
    opts.optflag("b", "", "force batch mode (no progress output)");
    opts.optflag("", "json", "emit a JSON report instead of text");
    opts.optflag("h", "help", "show this help and exit");

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned());

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            print_usage(&program, &opts);
            return ExitCode::FAILURE;
        }
    };

    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return ExitCode::FAILURE;
    }

    if matches.free.is_empty() {
        eprintln!("error: no directories given");
        print_usage(&program, &opts);
        return ExitCode::FAILURE;
    }

    let mut dopt = DupOptions::default();
    for c in matches.opt_strs("c") {
        if let Err(e) = apply_size_condition(&c, &mut dopt) {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    }

    let interactive = if matches.opt_present("i") {
        true
    } else if matches.opt_present("b") {
        false
    } else {
        io::stdout().is_terminal()
    };

    let use_json = matches.opt_present("json");
    #[cfg(not(feature = "json"))]
    if use_json {
        eprintln!("error: this binary was built without JSON support");
        return ExitCode::FAILURE;
    }

    ctrlc::set_handler(|| {
        BREAK_COUNTER.fetch_add(1, Ordering::SeqCst);
    })
    .ok();

    let mut orchestrator = Orchestrator::new();
    orchestrator.options = dopt;
    orchestrator.break_flag = Some(&BREAK_COUNTER);

    let sink: Box<dyn ReportSink> = if use_json {
        #[cfg(feature = "json")]
        {
            Box::new(JsonReportSink::new())
        }
        #[cfg(not(feature = "json"))]
        {
            unreachable!()
        }
    } else {
        Box::new(TextReportSink::new(interactive))
    };
    orchestrator.set_sink(sink);

    for dir in &matches.free {
        orchestrator.add_root(dir);
    }

    if orchestrator.scan_roots().is_empty() {
        eprintln!("error: none of the given directories could be scanned");
        return ExitCode::FAILURE;
    }

    match orchestrator.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(io::stderr(), "error: {e}");
            ExitCode::FAILURE
        }
    }
}
