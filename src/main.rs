//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{anyhow, Context};
use basicc::{cfg, emit, error::Diagnostic, lex, parse, source, target};

use std::{
    fs::File,
    io::{BufReader, BufWriter},
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = clap::App::new("BASIC compiler")
        .version(clap::crate_version!())
        .arg(
            clap::Arg::new("input")
                .index(1)
                .required(true)
                .value_name("INPUTFILE")
                .help("Source file to compile"),
        )
        .arg(
            clap::Arg::new("output")
                .index(2)
                .required(true)
                .value_name("OUTPUTFILE")
                .help("Output listing file"),
        )
        .get_matches();

    let input = args.value_of("input").expect("input is required");
    let output = args.value_of("output").expect("output is required");

    let file =
        File::open(input).with_context(|| format!("Failed to open source file: {}", input))?;

    let tokens = lex::tokenize(source::lines(BufReader::new(file), input))
        .map_err(|error| anyhow!("{}", Diagnostic::from(error)))?;

    let program =
        parse::parse(tokens).map_err(|error| anyhow!("{}", Diagnostic::from(error)))?;

    let blocks = cfg::build_blocks(&program);
    let module = emit::emit(&program, &blocks).context("Failed to lower program")?;

    // El artefacto no se crea hasta que toda la pipeline haya tenido
    // éxito; nunca se escribe un listado parcial
    let mut file = BufWriter::new(
        File::create(output).with_context(|| format!("Failed to open for writing: {}", output))?,
    );

    target::write(&module, &mut file)
        .with_context(|| format!("Failed to write listing: {}", output))?;

    Ok(())
}
