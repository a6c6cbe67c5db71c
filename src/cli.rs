// ============================================================================
// MemeFE CLI — headless meme rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   memefe -i cat.jpg --top "i can has" --bottom "cheezburger" -o meme.png
//   memefe -i *.jpg --top "monday" --output-dir out/ --format jpg
//   memefe -i dog.png --bottom "such wow" --nudge bottom:0,-20 -o doge.png
//   memefe --list-fonts

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{Anchor, OverlaySlot};
use crate::components::tools::PointerEvent;
use crate::io::{encode_and_write, SaveFormat};
use crate::ops::text::{
    enumerate_system_fonts, load_display_font, load_font_file, FontRasterizer,
};
use crate::session::CompositorSession;
use crate::settings::MemeSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MemeFE headless meme renderer.
#[derive(Parser, Debug)]
#[command(
    name = "memefe",
    about = "Render captioned memes without a browser",
    long_about = "Overlay outlined top/bottom captions on images and write the result.\n\
                  The output is rendered at display size: the image is fitted into a\n\
                  --width square, exactly as the interactive editor shows it.\n\n\
                  Example:\n  \
                  memefe -i cat.jpg --top \"i can has\" --bottom \"cheezburger\" -o meme.png"
)]
pub struct CliArgs {
    /// Input image(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, num_args = 1..)]
    pub input: Vec<String>,

    /// Top caption.
    #[arg(long, default_value = "")]
    pub top: String,

    /// Bottom caption.
    #[arg(long, default_value = "")]
    pub bottom: String,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png or jpg. Inferred from --output's extension when omitted.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100). Defaults to the saved setting.
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Container width in pixels the image is fitted into.
    #[arg(short, long, value_name = "PX")]
    pub width: Option<u32>,

    /// Caption font size in pixels.
    #[arg(long, value_name = "PX")]
    pub font_size: Option<u32>,

    /// Caption fill color as hex (#fff, #ffcc00).
    #[arg(long, value_name = "HEX")]
    pub color: Option<String>,

    /// System font family for captions.
    #[arg(long, value_name = "NAME")]
    pub font_family: Option<String>,

    /// Font file (TTF/OTF) for captions; overrides --font-family.
    #[arg(long, value_name = "FILE")]
    pub font: Option<PathBuf>,

    /// Top caption anchor as "rx,ry" fractions of the canvas.
    #[arg(long, value_name = "RX,RY", value_parser = parse_anchor)]
    pub top_anchor: Option<Anchor>,

    /// Bottom caption anchor as "rx,ry" fractions of the canvas.
    #[arg(long, value_name = "RX,RY", value_parser = parse_anchor)]
    pub bottom_anchor: Option<Anchor>,

    /// Drag a caption by a pixel offset, e.g. "top:0,15". Repeatable.
    #[arg(long, value_name = "SLOT:DX,DY", value_parser = parse_nudge)]
    pub nudge: Vec<Nudge>,

    /// Print the available system font families and exit.
    #[arg(long)]
    pub list_fonts: bool,

    /// Write the session log here instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print per-file timing and echo log lines to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

/// A scripted drag: grab `slot` and move it by (dx, dy) surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Nudge {
    pub slot: OverlaySlot,
    pub dx: f32,
    pub dy: f32,
}

fn parse_pair(value: &str) -> Result<(f32, f32), String> {
    let (a, b) = value
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated numbers, got '{}'", value))?;
    let a = a.trim().parse::<f32>().map_err(|e| format!("'{}': {}", a, e))?;
    let b = b.trim().parse::<f32>().map_err(|e| format!("'{}': {}", b, e))?;
    Ok((a, b))
}

fn parse_anchor(value: &str) -> Result<Anchor, String> {
    let (rx, ry) = parse_pair(value)?;
    Ok(Anchor::new(rx, ry))
}

fn parse_nudge(value: &str) -> Result<Nudge, String> {
    let (slot, offset) = value
        .split_once(':')
        .ok_or_else(|| format!("expected SLOT:DX,DY, got '{}'", value))?;
    let slot = slot.parse::<OverlaySlot>()?;
    let (dx, dy) = parse_pair(offset)?;
    Ok(Nudge { slot, dx, dy })
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    match &args.log {
        Some(path) => crate::logger::init_at(path, args.verbose),
        None => crate::logger::init_at(&crate::logger::default_log_path(), args.verbose),
    }

    if args.verbose
        && let Some(path) = crate::logger::log_path()
    {
        println!("Logging to {}", path.display());
    }

    if args.list_fonts {
        for family in enumerate_system_fonts() {
            println!("{}", family);
        }
        return ExitCode::SUCCESS;
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let mut settings = MemeSettings::load();
    if let Some(w) = args.width {
        settings.container_width = w;
    }
    if let Some(size) = args.font_size {
        settings.font_size = size;
    }
    if let Some(q) = args.quality {
        settings.jpeg_quality = q.clamp(1, 100);
    }

    let font = match &args.font {
        Some(path) => load_font_file(path),
        None => load_display_font(
            args.font_family
                .as_deref()
                .or(Some(settings.font_family.as_str()).filter(|f| !f.is_empty())),
        ),
    };
    let rasterizer = match font {
        Ok(font) => FontRasterizer::new(font),
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let save_format = parse_format(args.format.as_deref(), args.output.as_deref());

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        let mut session = CompositorSession::new(Box::new(rasterizer.clone()), &settings);
        match run_one(&mut session, input_path, &output_path, &args, save_format, &settings) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    session: &mut CompositorSession,
    input: &Path,
    output: &Path,
    args: &CliArgs,
    format: SaveFormat,
    settings: &MemeSettings,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let bytes = std::fs::read(input).map_err(|e| format!("read failed: {}", e))?;
    let id = input.display().to_string();
    session.begin_load(id, bytes);
    session
        .finish_load()
        .map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Style and captions --------------------------------------
    if let Some(color) = &args.color {
        session.set_text_color(color).map_err(|e| e.to_string())?;
    }
    session.set_captions(args.top.as_str(), args.bottom.as_str());

    if let Some(anchor) = args.top_anchor {
        session.set_anchor(OverlaySlot::Top, anchor);
    }
    if let Some(anchor) = args.bottom_anchor {
        session.set_anchor(OverlaySlot::Bottom, anchor);
    }

    // -- Step 3: Scripted drags ------------------------------------------
    for nudge in &args.nudge {
        replay_nudge(session, *nudge)?;
    }

    // -- Step 4: Save ----------------------------------------------------
    match format {
        SaveFormat::Png => {
            let png = session.export_png().map_err(|e| e.to_string())?;
            std::fs::write(output, png).map_err(|e| format!("save failed: {}", e))?;
        }
        SaveFormat::Jpeg => {
            let frame = session.export_frame().map_err(|e| e.to_string())?;
            encode_and_write(frame, output, format, settings.jpeg_quality)
                .map_err(|e| format!("save failed: {}", e))?;
        }
    }

    Ok(())
}

/// Press on the caption just above its baseline, move by the offset, release.
fn replay_nudge(session: &mut CompositorSession, nudge: Nudge) -> Result<(), String> {
    let (ax, ay) = session
        .anchor_px(nudge.slot)
        .ok_or_else(|| "nothing rendered to drag on".to_string())?;
    let grab_y = ay - session.font_size() as f32 * 0.5;

    session.handle_pointer(PointerEvent::Down { x: ax, y: grab_y });
    if session.drag_target() != Some(nudge.slot) {
        session.handle_pointer(PointerEvent::Cancel);
        return Err(format!(
            "cannot grab the {} caption (empty or covered by another caption)",
            nudge.slot.label()
        ));
    }
    session.handle_pointer(PointerEvent::Move {
        x: ax + nudge.dx,
        y: grab_y + nudge.dy,
    });
    session.handle_pointer(PointerEvent::Up);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from `--format` or the output extension.
/// Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(format) = format_arg.and_then(SaveFormat::from_name) {
        return format;
    }

    output
        .and_then(|out| out.extension())
        .and_then(|e| e.to_str())
        .and_then(SaveFormat::from_name)
        .unwrap_or_default()
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, `<stem>_meme.<ext>`)
/// 3. Fallback: next to the input, `<stem>_meme.<ext>`
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let file_name = format!("{}_meme.{}", stem, ext);

    if let Some(dir) = output_dir {
        return Some(dir.join(file_name));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(file_name))
}
