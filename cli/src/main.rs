use std::env;
use std::io;
use std::io::Write;
use std::process;

use tracing::info;

use chartparse::beam::BeamParams;
use chartparse::{ChartParser, Err, Grammar, ParserConfig};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} FILE [options]

Reads sentences from stdin, one per line, and prints the best parse of each.

Options:
  -h, --help              Print this message
  -c, --chart             Print the parse chart (defaults to not printing)
  -s, --strategy NAME     exhaustive, beam, weak-beam or agenda (default exhaustive)
  -l, --lookup NAME       grammar-loop, hash or matrix (default hash)
  -w, --beam-width N      Most edges per cell for beam strategies
  -d, --beam-delta X      Relative FOM cutoff for beam strategies
  -f, --fom NAME          inside or prior (default inside)
      --max-pops N        Pop budget for the agenda strategy

Set RUST_LOG=debug for per-sentence statistics.",
    prog_name
  )
}

fn parse(parser: &dyn ChartParser<'_>, g: &Grammar, sentence: &str, print_chart: bool) -> Result<(), Err> {
  let sentence = sentence.split_whitespace().collect::<Vec<_>>();
  if sentence.is_empty() {
    return Ok(());
  }

  if print_chart {
    let chart = parser.parse_chart(&sentence)?;
    println!("chart:\n{}", chart.display(g));
  }

  let parse = parser.parse(&sentence)?;
  println!("{}", parse);
  println!("{}\n", parse.stats);

  Ok(())
}

struct Args {
  filename: String,
  print_chart: bool,
  config: ParserConfig,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    let mut iter = v.into_iter();
    let Some(prog_name) = iter.next() else {
      return Err(Self::make_error_message("bad argument vector", "chartparse"));
    };

    let mut filename: Option<String> = None;
    let mut print_chart = false;
    let mut config = ParserConfig::default();
    let mut beam = BeamParams::default();

    while let Some(o) = iter.next() {
      let flag = o.as_str();
      if flag == "-h" || flag == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if flag == "-c" || flag == "--chart" {
        print_chart = true;
        continue;
      } else if !flag.starts_with('-') {
        if filename.is_some() {
          return Err(Self::make_error_message("invalid arguments", &prog_name));
        }
        filename = Some(o);
        continue;
      }

      let Some(value) = iter.next() else {
        return Err(Self::make_error_message(&format!("{} needs a value", flag), &prog_name));
      };
      let bad_value = |e: &dyn std::fmt::Display| {
        Self::make_error_message(&format!("bad value {:?} for {}: {}", value, flag, e), &prog_name)
      };

      match flag {
        "-s" | "--strategy" => config.strategy = value.parse().map_err(|e: Err| bad_value(&e))?,
        "-l" | "--lookup" => config.lookup = value.parse().map_err(|e: Err| bad_value(&e))?,
        "-f" | "--fom" => config.fom = value.parse().map_err(|e: Err| bad_value(&e))?,
        "-w" | "--beam-width" => beam.beam_width = value.parse().map_err(|e| bad_value(&e))?,
        "-d" | "--beam-delta" => beam.delta = value.parse().map_err(|e| bad_value(&e))?,
        "--max-pops" => config.max_pops = value.parse().map_err(|e| bad_value(&e))?,
        _ => return Err(Self::make_error_message(&format!("unknown option {}", flag), &prog_name)),
      }
    }
    config.beam = beam;

    if let Some(filename) = filename {
      Ok(Self {
        filename,
        print_chart,
        config,
      })
    } else {
      Err(Self::make_error_message("missing filename", &prog_name))
    }
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
    )
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let g = Grammar::read_from_file(&opts.filename)?;
  info!(
    file = %opts.filename,
    nonterminals = g.num_nonterminals(),
    strategy = %opts.config.strategy,
    lookup = %opts.config.lookup,
    "loaded grammar"
  );
  let parser = opts.config.build(&g);

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        if let Err(e) = parse(parser.as_ref(), &g, input.trim(), opts.print_chart) {
          eprintln!("error: {}", e);
        }
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
