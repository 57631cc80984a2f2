//! pageforge – command-line document exporter.
//!
//! Usage:
//!   pageforge <input.html> [output] [--format pdf|raster-pdf|rtf|doc] [--theme NAME]
//!             [--var NAME=VALUE]... [--data vars.json] [--meta WORDS,CHARS]
//!             [--no-page-numbers] [--landscape] [--title TEXT] [--sample NAME]
//!
//! If `output` is omitted the result is written next to the input file with
//! the same stem and the format's extension (e.g. `report.html` → `report.rtf`).

use std::error::Error as _;
use std::{env, fs, path::PathBuf, process};

use page_forge::export::{export, structured_layout_config, ExportFormat, ExportOptions, ExportRequest};
use page_forge::geometry::PageOrientation;
use page_forge::interpolate::{TemplateData, TemplateValue};
use page_forge::templates::{sample, SAMPLE_NAMES};
use page_forge::theme::ThemeKey;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut sample_name: Option<String> = None;
    let mut layout_json: Option<PathBuf> = None;
    let mut format = ExportFormat::StructuredPdf;
    let mut request = ExportRequest::default();
    let mut options = ExportOptions::default();
    let mut data = TemplateData::new();
    let mut title: Option<String> = None;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--landscape" | "-l" => options.orientation = PageOrientation::Landscape,
            "--no-page-numbers" => options.page_numbers = false,
            "--text-nodes-only" => options.text_nodes_only = true,
            "--title" | "-t" => title = Some(value(&mut iter, arg, &args[0]).to_string()),
            "--format" | "-f" => {
                format = value(&mut iter, arg, &args[0])
                    .parse()
                    .unwrap_or_else(|e| fail(&format!("{e}")))
            }
            "--theme" => request.theme = ThemeKey::from_name(value(&mut iter, arg, &args[0])),
            "--var" => {
                let pair = value(&mut iter, arg, &args[0]);
                let Some((name, raw)) = pair.split_once('=') else {
                    fail(&format!("--var expects NAME=VALUE, got {pair:?}"));
                };
                data.insert(name.to_string(), parse_value(raw));
            }
            "--data" => {
                let path = value(&mut iter, arg, &args[0]);
                let json = fs::read_to_string(path)
                    .unwrap_or_else(|e| fail(&format!("Error reading '{path}': {e}")));
                let parsed: TemplateData = serde_json::from_str(&json)
                    .unwrap_or_else(|e| fail(&format!("Invalid variables in '{path}': {e}")));
                data.extend(parsed);
            }
            "--meta" => {
                let raw = value(&mut iter, arg, &args[0]);
                let counts: Option<(u64, u64)> = raw
                    .split_once(',')
                    .and_then(|(w, c)| Some((w.trim().parse().ok()?, c.trim().parse().ok()?)));
                let Some((words, chars)) = counts else {
                    fail(&format!("--meta expects WORDS,CHARS, got {raw:?}"));
                };
                request = request.with_meta(words, chars);
            }
            "--sample" => sample_name = Some(value(&mut iter, arg, &args[0]).to_string()),
            "--layout-json" => layout_json = Some(PathBuf::from(value(&mut iter, arg, &args[0]))),
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                if positional == 0 {
                    input_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
                positional += 1;
            }
        }
    }

    // With --sample the only positional argument is the output path.
    if sample_name.is_some() && output_path.is_none() {
        output_path = input_path.take();
    }

    let (content, stem, default_dir) = match (&sample_name, &input_path) {
        (Some(name), _) => {
            let html = sample(name).unwrap_or_else(|| {
                fail(&format!("Unknown sample {name:?} (known: {})", SAMPLE_NAMES.join(", ")))
            });
            (html, name.clone(), None)
        }
        (None, Some(input)) => {
            let html = fs::read_to_string(input)
                .unwrap_or_else(|e| fail(&format!("Error reading '{}': {e}", input.display())));
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("export")
                .to_string();
            (html, stem, input.parent().map(PathBuf::from))
        }
        (None, None) => {
            eprintln!("Error: no input file specified.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    request.content = content;
    if !data.is_empty() {
        request.template_data = Some(data);
    }
    options.title = title.unwrap_or_else(|| stem.clone());

    if let Some(path) = layout_json {
        match structured_layout_config(&request, &options) {
            Ok(layout) => {
                if let Err(e) = fs::write(&path, layout.to_json()) {
                    fail(&format!("Error writing '{}': {e}", path.display()));
                }
            }
            Err(e) => fail(&format!("Error: {e}")),
        }
    }

    let output = output_path.unwrap_or_else(|| {
        let mut o = default_dir.unwrap_or_default();
        o.push(format!("{stem}.{}", format.extension()));
        o
    });

    match export(&request, format, &options) {
        Ok(out) => {
            // Create output directory if necessary.
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        fail(&format!("Error creating output directory: {e}"));
                    }
                }
            }
            if let Err(e) = fs::write(&output, &out.bytes) {
                fail(&format!("Error writing '{}': {e}", output.display()));
            }
            match out.page_count {
                Some(pages) => eprintln!(
                    "Wrote '{}' ({} bytes, {} page{})",
                    output.display(),
                    out.bytes.len(),
                    pages,
                    if pages == 1 { "" } else { "s" }
                ),
                None => eprintln!("Wrote '{}' ({} bytes)", output.display(), out.bytes.len()),
            }
        }
        Err(e) => {
            let mut msg = format!("Error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                msg.push_str(&format!("\n  caused by: {cause}"));
                source = cause.source();
            }
            fail(&msg);
        }
    }
}

fn value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> &'a str {
    match iter.next() {
        Some(v) => v.as_str(),
        None => {
            eprintln!("Missing value for {flag}");
            print_usage(prog);
            process::exit(1);
        }
    }
}

/// Numbers stay numbers so they format the same as JSON-supplied values.
fn parse_value(raw: &str) -> TemplateValue {
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => TemplateValue::Number(n),
        _ => TemplateValue::Text(raw.to_string()),
    }
}

fn fail(msg: &str) -> ! {
    eprintln!("{msg}");
    process::exit(1);
}

fn print_usage(prog: &str) {
    eprintln!("pageforge – document exporter (page-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.html> [output] [flags]");
    eprintln!("  {prog} --sample NAME [output] [flags]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input.html>          Editor HTML fragment (images must be base64 data URIs)");
    eprintln!("  [output]              Output path (default: input stem + format extension)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --format, -f FORMAT   pdf (structured, default), raster-pdf, rtf or doc");
    eprintln!("  --theme NAME          default, modern, minimal or professional");
    eprintln!("  --var NAME=VALUE      Template variable (repeatable)");
    eprintln!("  --data FILE           JSON object of template variables");
    eprintln!("  --meta WORDS,CHARS    Word/character counts for the PDF footer");
    eprintln!("  --no-page-numbers     Omit 'Page i of N' from the PDF footer");
    eprintln!("  --text-nodes-only     Substitute variables in text only, not in attributes");
    eprintln!("  --landscape, -l       Landscape A4 pages");
    eprintln!("  --title, -t TEXT      Document title (default: input filename stem)");
    eprintln!("  --sample NAME         Export a built-in sample ({})", SAMPLE_NAMES.join(", "));
    eprintln!("  --layout-json FILE    Also write the structured page layout as JSON");
    eprintln!("  --help                Print this message");
}
