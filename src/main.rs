use colour::{e_red_ln, green_ln_bold, grey_ln, red_ln};
use sbasm::assembler;
use sbasm::settings::{self, Config};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

struct Options {
    input: PathBuf,
    output: Option<PathBuf>,
    import_dirs: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help(false);
        return ExitCode::FAILURE;
    }

    let options = match get_options(&args[1..]) {
        Ok(options) => options,
        Err(e) => {
            red_ln!("{}", e);
            print_help(true);
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();

    // Config first, command line flags after, so the flags win
    let config = Config::load_next_to(&options.input);
    let mut import_dirs = config.import_dirs;
    import_dirs.extend(options.import_dirs);

    let output_path = options
        .output
        .or(config.output)
        .unwrap_or_else(|| options.input.with_extension(settings::BYTE_FILE_EXTENSION));

    let unit = assembler::assemble(&options.input, &import_dirs);
    if !unit.messages.is_empty() {
        print!("{}", unit.messages);
    }

    if unit.has_error {
        e_red_ln!("Assembly failed.");
        return ExitCode::FAILURE;
    }

    let assembly = unit
        .assembly
        .expect("a unit without errors always carries an assembly");
    match assembly.generate(&output_path) {
        Ok(()) => {
            green_ln_bold!("Assembled '{}'", output_path.display());
            grey_ln!("Finished in {:?}", start.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            e_red_ln!("Error: Failed to write '{}': {}", output_path.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn get_options(args: &[String]) -> Result<Options, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut import_dirs: Vec<PathBuf> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-o" => match iter.next() {
                Some(path) => output = Some(PathBuf::from(path)),
                None => return Err("Expected an output path after '-o'".to_string()),
            },
            "-I" => match iter.next() {
                Some(dir) => import_dirs.push(PathBuf::from(dir)),
                None => return Err("Expected a directory after '-I'".to_string()),
            },
            flag if flag.starts_with('-') => {
                return Err(format!("Invalid flag '{flag}'"));
            }
            path => {
                if input.is_some() {
                    return Err(format!("Unexpected extra input '{path}'"));
                }
                input = Some(PathBuf::from(path));
            }
        }
    }

    match input {
        Some(input) => Ok(Options {
            input,
            output,
            import_dirs,
        }),
        None => Err("Expected an input file".to_string()),
    }
}

fn print_help(commands_only: bool) {
    if !commands_only {
        grey_ln!("------------------------------------");
        green_ln_bold!("The sbasm assembler");
    }
    println!("Usage: sbasm <input> [-o <output>] [-I <dir>]...");
    println!(
        "  <input>      - Source file to assemble (.{})",
        settings::SOURCE_FILE_EXTENSION
    );
    println!(
        "  -o <output>  - Output path (defaults to the input with a .{} extension)",
        settings::BYTE_FILE_EXTENSION
    );
    println!("  -I <dir>     - Adds a search directory for system imports, may be repeated");
}
