// ============================================================================
// PhotoEdit CLI - headless batch editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   photoedit --input photo.jpg --rotate cw --brightness 20 --output result.png
//   photoedit -i shots/*.jpg --grain 30 --grain-seed 7 --output-dir processed/
//   photoedit -i scan.png --crop 40,40,300,200 --remove-background -o cut.png
//   photoedit -i photo.png --vignette 50 --upload http://127.0.0.1:5000 --title "Beach"
//
// No window is opened in CLI mode.  Each file runs through its own editing
// session, so the result is exactly what the editor would download.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::ops::filters::FilterKind;
use crate::ops::transform::RotateDirection;
use crate::project::Project;
use crate::remote;
use crate::settings::AppSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PhotoEdit headless image editor.
///
/// Rotate, crop, filter and key out backgrounds without opening the window.
#[derive(Parser, Debug)]
#[command(
    name = "photoedit",
    about = "PhotoEdit headless batch editor",
    long_about = "Apply the editor's rotate, crop, filter and background removal\n\
                  operations to image files without opening the window. Output is\n\
                  always PNG, rendered exactly like the editor's download.\n\n\
                  Example:\n  \
                  photoedit --input photo.png --rotate cw --contrast 25 --output result.png\n  \
                  photoedit -i *.jpg --hue 90 --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output PNG path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing (written as <stem>.png).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Rotate by 90°: cw or ccw. Repeat to rotate several times.
    #[arg(long, value_name = "cw|ccw")]
    pub rotate: Vec<String>,

    /// Crop region in image pixels after rotation: x,y,width,height.
    #[arg(long, value_name = "X,Y,W,H")]
    pub crop: Option<String>,

    /// Brightness offset in percent (-100..100).
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub brightness: i32,

    /// Contrast offset in percent (-100..100).
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub contrast: i32,

    /// Saturation offset in percent (-100..100).
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub saturation: i32,

    /// Hue rotation in degrees (-180..180).
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub hue: i32,

    /// Gaussian blur radius in pixels (0..20).
    #[arg(long, default_value_t = 0)]
    pub blur: i32,

    /// Vignette strength (0..100).
    #[arg(long, default_value_t = 0)]
    pub vignette: i32,

    /// Film grain strength (0..100).
    #[arg(long, default_value_t = 0)]
    pub grain: i32,

    /// Colour temperature shift (-100 cool .. 100 warm).
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub temperature: i32,

    /// Fixed grain noise seed for reproducible output.
    #[arg(long, default_value_t = 0)]
    pub grain_seed: u32,

    /// Key out the top-left colour before filtering.
    #[arg(long)]
    pub remove_background: bool,

    /// Keep the full resolution instead of fitting into 800×600.
    #[arg(long)]
    pub no_fit: bool,

    /// Also save each result to a project server at this base URL.
    #[arg(long, value_name = "URL")]
    pub upload: Option<String>,

    /// Project title for --upload (defaults to the file stem).
    #[arg(long)]
    pub title: Option<String>,

    /// Project description for --upload.
    #[arg(long, default_value = "")]
    pub description: String,

    /// Print per-file timing and upload ids.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

/// Everything applied to each input, parsed once up front.
#[derive(Clone, Debug, Default, PartialEq)]
struct EditPlan {
    rotations: Vec<RotateDirection>,
    crop: Option<(i64, i64, u32, u32)>,
    filters: Vec<(FilterKind, i32)>,
    remove_background: bool,
}

impl EditPlan {
    fn from_args(args: &CliArgs) -> Result<Self, String> {
        let rotations = args
            .rotate
            .iter()
            .map(|r| parse_rotation(r))
            .collect::<Result<Vec<_>, _>>()?;
        let crop = args.crop.as_deref().map(parse_crop).transpose()?;
        let filters = [
            (FilterKind::Brightness, args.brightness),
            (FilterKind::Contrast, args.contrast),
            (FilterKind::Saturation, args.saturation),
            (FilterKind::Hue, args.hue),
            (FilterKind::Blur, args.blur),
            (FilterKind::Vignette, args.vignette),
            (FilterKind::Grain, args.grain),
            (FilterKind::Temperature, args.temperature),
        ]
        .into_iter()
        .filter(|&(_, v)| v != 0)
        .collect();

        Ok(Self {
            rotations,
            crop,
            filters,
            remove_background: args.remove_background,
        })
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let plan = match EditPlan::from_args(&args) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    // Multiple inputs require --output-dir, not --output
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

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

    let settings = AppSettings::load();
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(&settings, &args, &plan, input_path, &output_path) {
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
    settings: &AppSettings,
    args: &CliArgs,
    plan: &EditPlan,
    input: &Path,
    output: &Path,
) -> Result<(), String> {
    let mut project = Project::new(settings);
    project.set_grain_seed(Some(args.grain_seed));
    if args.no_fit {
        project.set_fit_bounds(0, 0);
    }

    // -- Step 1: Load ----------------------------------------------------
    project
        .open_path(input)
        .map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Edit ----------------------------------------------------
    apply_plan(&mut project, plan).map_err(|e| e.to_string())?;

    // -- Step 3: Save ----------------------------------------------------
    project
        .download(output)
        .map_err(|e| format!("save failed: {}", e))?;

    // -- Step 4: Upload (optional) ---------------------------------------
    if let Some(server_url) = &args.upload {
        if let Some(title) = &args.title {
            project.title = title.clone();
        }
        project.description = args.description.clone();
        let request = project.save_request().map_err(|e| e.to_string())?;
        let id = remote::save_project_blocking(server_url, &request).map_err(|e| e.to_string())?;
        if args.verbose {
            match id {
                Some(id) => println!("  uploaded as project {}", id),
                None => println!("  uploaded"),
            }
        }
    }

    Ok(())
}

/// Rotations first, then the crop, background removal and filters.
fn apply_plan(project: &mut Project, plan: &EditPlan) -> Result<(), crate::project::EditorError> {
    for &direction in &plan.rotations {
        project.rotate(direction)?;
    }
    if let Some((x, y, w, h)) = plan.crop {
        project.crop.start_x = x as f32;
        project.crop.start_y = y as f32;
        project.crop.end_x = x.saturating_add(w as i64) as f32;
        project.crop.end_y = y.saturating_add(h as i64) as f32;
        project.apply_crop()?;
    }
    if plan.remove_background {
        project.remove_background()?;
    }
    for &(kind, value) in &plan.filters {
        project.set_filter(kind, value);
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_rotation(arg: &str) -> Result<RotateDirection, String> {
    match arg.trim().to_lowercase().as_str() {
        "cw" | "right" | "90" => Ok(RotateDirection::Clockwise),
        "ccw" | "left" | "-90" => Ok(RotateDirection::CounterClockwise),
        other => Err(format!("invalid rotation '{}' (expected cw or ccw)", other)),
    }
}

/// Parse `x,y,w,h`.
fn parse_crop(arg: &str) -> Result<(i64, i64, u32, u32), String> {
    let parts: Vec<&str> = arg.split(',').map(str::trim).collect();
    let [x, y, w, h] = parts.as_slice() else {
        return Err(format!("invalid crop '{}' (expected x,y,width,height)", arg));
    };
    let bad = |what: &str| format!("invalid crop {} in '{}'", what, arg);
    Ok((
        x.parse().map_err(|_| bad("x"))?,
        y.parse().map_err(|_| bad("y"))?,
        w.parse().map_err(|_| bad("width"))?,
        h.parse().map_err(|_| bad("height"))?,
    ))
}

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

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, `<stem>.png`)
/// 3. Fallback: next to the input as `<stem>.png`, or `<stem>_edited.png`
///    when that would overwrite the input
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.png", stem));
    if candidate == input {
        Some(parent.join(format!("{}_edited.png", stem)))
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn crop_argument_parses_four_numbers() {
        assert_eq!(parse_crop("10, 20,300,200").unwrap(), (10, 20, 300, 200));
        assert_eq!(parse_crop("-5,0,50,50").unwrap(), (-5, 0, 50, 50));
        assert!(parse_crop("1,2,3").is_err());
        assert!(parse_crop("a,b,c,d").is_err());
        assert!(parse_crop("1,2,-3,4").is_err());
    }

    #[test]
    fn rotation_argument_accepts_aliases() {
        assert_eq!(parse_rotation("CW").unwrap(), RotateDirection::Clockwise);
        assert_eq!(parse_rotation("left").unwrap(), RotateDirection::CounterClockwise);
        assert!(parse_rotation("180").is_err());
    }

    #[test]
    fn args_parse_negative_filter_values() {
        let args = CliArgs::try_parse_from([
            "photoedit", "-i", "a.png", "--brightness", "-30", "--rotate", "cw", "--rotate", "cw",
        ])
        .unwrap();
        let plan = EditPlan::from_args(&args).unwrap();
        assert_eq!(plan.rotations.len(), 2);
        assert_eq!(plan.filters, vec![(FilterKind::Brightness, -30)]);
        assert!(plan.crop.is_none());
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/beach.jpg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out"))),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out"))),
            Some(PathBuf::from("out/beach.png"))
        );
        assert_eq!(build_output_path(input, None, None), Some(PathBuf::from("shots/beach.png")));
        assert_eq!(
            build_output_path(Path::new("shots/beach.png"), None, None),
            Some(PathBuf::from("shots/beach_edited.png"))
        );
    }

    #[test]
    fn plan_runs_through_a_session() {
        let mut project = Project::new(&AppSettings::default());
        project.set_grain_seed(Some(3));
        project.load_image(RgbaImage::from_fn(60, 40, |x, _| {
            if x < 30 { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 200, 255]) }
        }));
        let plan = EditPlan {
            rotations: vec![RotateDirection::Clockwise],
            crop: Some((0, 0, 40, 30)),
            filters: vec![(FilterKind::Brightness, 10)],
            remove_background: true,
        };
        apply_plan(&mut project, &plan).unwrap();

        let out = project.rendered_image().unwrap();
        assert_eq!(out.dimensions(), (40, 30));
        assert_eq!(project.history.len(), 4);
        assert_eq!(project.filters.brightness, 10);
    }

    #[test]
    fn too_small_crop_fails_the_file() {
        let mut project = Project::new(&AppSettings::default());
        project.load_image(RgbaImage::new(50, 50));
        let plan = EditPlan { crop: Some((0, 0, 5, 5)), ..Default::default() };
        assert!(apply_plan(&mut project, &plan).is_err());
    }

    #[test]
    fn oversized_crop_fails_the_file_without_allocating() {
        let mut project = Project::new(&AppSettings::default());
        project.load_image(RgbaImage::new(50, 50));
        let crop = parse_crop("0,0,4294967295,4294967295").unwrap();
        let plan = EditPlan { crop: Some(crop), ..Default::default() };
        assert!(matches!(
            apply_plan(&mut project, &plan),
            Err(crate::project::EditorError::CropRegionTooLarge { .. })
        ));
        assert_eq!(project.current().unwrap().dimensions(), (50, 50));
    }
}
