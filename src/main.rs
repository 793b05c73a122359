//! ttf_render
//!
//! Loads a TrueType font, renders a line of text (or a single glyph) and
//! writes the result as a Netpbm image, with an ASCII preview on stdout.

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use common::Color;
use font::{
    draw_string_traced, rasterize_glyph_traced, Bitmap, Font, FontIdAllocator, GlyphCache, LoadOptions,
    RenderedGlyph, Tracer,
};

static FONT_IDS: FontIdAllocator = FontIdAllocator::new();

#[derive(Parser, Debug)]
#[command(version, about = "Render text with a TrueType font.")]
struct Args {
    /// The input TrueType font file.
    font: PathBuf,

    /// Text to render. Characters above U+00FF are drawn as '?'.
    text: String,

    /// Point size, at 96 DPI.
    #[arg(short, long, default_value_t = 16.0)]
    size: f32,

    /// Text color as RRGGBB or RRGGBBAA hex.
    #[arg(short, long, default_value = "000000")]
    color: String,

    /// Write the image here: PGM coverage for --glyph, PAM RGBA otherwise.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Render only the first character of TEXT as a coverage bitmap.
    #[arg(short, long)]
    glyph: bool,

    /// Print load, rasterization and layout trace lines to stderr.
    #[arg(long)]
    trace: bool,

    /// Skip the ASCII preview.
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let data = fs::read(&args.font)
        .map_err(|e| format!("cannot read {}: {e}", args.font.display()))?;

    let sink = |line: &str| eprintln!("trace: {line}");
    let mut options = LoadOptions::new();
    let mut tracer = Tracer::none();
    if args.trace {
        options = options.trace(&sink);
        tracer = Tracer::new(&sink);
    }
    let font = Font::load_with(&data, &FONT_IDS, options)?;
    log::info!("loaded {} ({} glyphs decoded)", args.font.display(), font.decoded_glyphs());

    let color = Color::from_hex(&args.color)?;

    if args.glyph {
        let ch = args.text.chars().next().ok_or("no character given")?;
        let codepoint = u8::try_from(ch as u32).map_err(|_| format!("{ch:?} is outside 0-255"))?;
        let glyph = rasterize_glyph_traced(&font, codepoint, args.size, tracer)?;
        println!(
            "{ch:?}: {}x{} advance={} baseline={} bearing={}",
            glyph.width, glyph.height, glyph.advance_width, glyph.baseline_offset, glyph.bearing_x
        );
        if !args.quiet {
            print_preview(glyph.width, glyph.height, |x, y| glyph.coverage_at(x, y))?;
        }
        if let Some(path) = &args.output {
            fs::write(path, encode_pgm(&glyph))?;
        }
        return Ok(());
    }

    let cache = GlyphCache::new();
    let bitmap = draw_string_traced(&cache, &font, &args.text, args.size, color, tracer);
    println!("{}x{} from {} rasterized glyphs", bitmap.width, bitmap.height, cache.rasterization_count());
    if !args.quiet {
        print_preview(bitmap.width, bitmap.height, |x, y| (bitmap.pixel(x, y) >> 24) as u8)?;
    }
    if let Some(path) = &args.output {
        fs::write(path, encode_pam(&bitmap))?;
    }
    Ok(())
}

fn print_preview(width: usize, height: usize, level: impl Fn(usize, usize) -> u8) -> io::Result<()> {
    let stdout = io::stdout();
    write_preview(&mut stdout.lock(), width, height, level)
}

fn write_preview(
    out: &mut impl Write,
    width: usize,
    height: usize,
    level: impl Fn(usize, usize) -> u8,
) -> io::Result<()> {
    const RAMP: &[u8] = b" .:-=+*#%@";
    for y in 0..height {
        let row: Vec<u8> = (0..width)
            .map(|x| RAMP[level(x, y) as usize * (RAMP.len() - 1) / 255])
            .collect();
        out.write_all(&row)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

fn encode_pgm(glyph: &RenderedGlyph) -> Vec<u8> {
    let mut out = format!("P5\n{} {}\n255\n", glyph.width, glyph.height).into_bytes();
    out.extend_from_slice(&glyph.coverage);
    out
}

fn encode_pam(bitmap: &Bitmap) -> Vec<u8> {
    let mut out = format!(
        "P7\nWIDTH {}\nHEIGHT {}\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n",
        bitmap.width, bitmap.height
    )
    .into_bytes();
    for &argb in &bitmap.pixels {
        let c = Color::from_argb(argb);
        out.extend_from_slice(&[c.r, c.g, c.b, c.a]);
    }
    out
}
