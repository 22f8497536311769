use crate::config::options::DitherMode;
use crate::filters::planar::planar_pixel;
use crate::filters::prescale::{FadeWeights, fade_pixel, prescale_pixel};
use crate::filters::preview::{RgbImage, compose, gamma_table, sample};
use crate::filters::{Texels, packed};
use crate::foundation::core::{Quad, Rect};
use crate::foundation::error::{GxError, GxResult};
use crate::memory::cache::TexView;
use crate::render::backend::{BackendKind, FrameParams, Renderer, RendererOpts, Target};
use crate::stage::command::{Combine, CommandBlock, Compare, Lookup, Op};
use crate::surface::Surface;
use crate::surface::format::PixelFormat;
use rayon::prelude::*;
use smallvec::SmallVec;

/// Host renderer executing command blocks row by row.
///
/// Rows are independent, so the output is bit-identical with or without the worker pool.
pub struct SoftwareRenderer {
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for SoftwareRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareRenderer")
            .field("threads", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .finish()
    }
}

fn build_thread_pool(threads: Option<usize>) -> GxResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| GxError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

// State accumulated from the ops preceding a draw.
#[derive(Default)]
struct Program<'b> {
    combines: SmallVec<[&'b Combine; 2]>,
    compare: Option<Compare>,
    lut: Option<bool>,
    pattern: Option<DitherMode>,
    gamma: Option<f32>,
    place: Option<Quad>,
}

impl SoftwareRenderer {
    /// Renderer with a dedicated pool when `opts.parallel` allows more than one thread.
    pub fn new(opts: &RendererOpts) -> GxResult<Self> {
        let pool = if opts.parallel && opts.threads != Some(1) {
            Some(build_thread_pool(opts.threads)?)
        } else {
            None
        };
        Ok(Self { pool })
    }

    // Fill a `w`x`h` RGB buffer, one closure call per row.
    fn rows(&self, w: u32, h: u32, f: impl Fn(u32, &mut [u8]) + Sync) -> Vec<u8> {
        let row = w as usize * 3;
        let mut buf = vec![0u8; row * h as usize];
        if row == 0 {
            return buf;
        }
        match &self.pool {
            Some(pool) => pool.install(|| {
                buf.par_chunks_mut(row)
                    .enumerate()
                    .for_each(|(y, r)| f(y as u32, r));
            }),
            None => buf
                .chunks_mut(row)
                .enumerate()
                .for_each(|(y, r)| f(y as u32, r)),
        }
        buf
    }

    fn draw(
        &self,
        prog: &Program<'_>,
        inputs: &[TexView<'_>],
        src: Rect,
        dst: Rect,
        output: &mut Target<'_>,
        frame: FrameParams,
    ) -> GxResult<()> {
        let Some(&first) = prog.combines.first() else {
            return Err(GxError::mismatch("draw without a combiner"));
        };
        let units: SmallVec<[Texels; 4]> = inputs.iter().map(Texels::from_view).collect();
        if units.is_empty() {
            return Err(GxError::mismatch("draw without a texture fetch"));
        }
        let (dw, dh) = (dst.w, dst.h);
        let retrace = frame.retrace.0;

        let rgb = match first {
            Combine::Accumulate { k } => {
                let Target::Surface(s) = output else {
                    return Err(GxError::mismatch("accumulate writes a surface"));
                };
                let prev = s.plane(0).to_vec();
                let k = *k;
                let cur = &units[0];
                self.rows(dw, dh, |y, row| {
                    for x in 0..dw {
                        let i = (y as usize * dw as usize + x as usize) * 4;
                        let p = [prev[i], prev[i + 1], prev[i + 2]];
                        let v = packed::accumulate(p, cur.rgb(i64::from(x), i64::from(y)), k);
                        row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&v);
                    }
                })
            }
            Combine::Yuv => {
                let cur = &units[0];
                self.rows(dw, dh, |y, row| {
                    for x in 0..dw {
                        let v = packed::rgb_to_yuv(cur.rgb(i64::from(x), i64::from(y)));
                        row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&v);
                    }
                })
            }
            Combine::Attenuate { alphas } => {
                let weights = FadeWeights::new(alphas);
                let dither = prog.pattern.unwrap_or(DitherMode::None);
                let sources: Vec<(Texels, SmallVec<[_; 3]>)> = units
                    .iter()
                    .zip(inputs)
                    .map(|(t, v)| (t.clone(), v.luts.clone()))
                    .collect();
                check_luts(inputs)?;
                self.rows(dw, dh, |y, row| {
                    for x in 0..dw {
                        let v = fade_pixel(&sources, &weights, dither, retrace, dw, dh, x, y);
                        row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&v);
                    }
                })
            }
            Combine::Matrix { coeffs, mono } => {
                let scaler = prog.combines.iter().find_map(|c| match c {
                    Combine::Scale(s) => Some(*s),
                    _ => None,
                });
                let src_tex = &units[0];
                let (sw, sh) = (src.w, src.h);
                let (coeffs, mono) = (*coeffs, *mono);
                let composed = RgbImage {
                    w: sw,
                    h: sh,
                    data: self.rows(sw, sh, |y, row| {
                        for x in 0..sw {
                            let v = compose(&coeffs, mono, src_tex.rgb(i64::from(x), i64::from(y)));
                            row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&v);
                        }
                    }),
                };
                let table = gamma_table(prog.gamma.unwrap_or(1.0));
                let scaler = scaler.unwrap_or_default();
                let quad = prog
                    .place
                    .unwrap_or_else(|| Quad::covering(dw, dh))
                    .shifted(frame.offset);
                if quad.covers(dw, dh) {
                    self.rows(dw, dh, |y, row| {
                        for x in 0..dw {
                            let v = sample(scaler, &composed, dw, dh, x, y)
                                .map(|c| table[c as usize]);
                            row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&v);
                        }
                    })
                } else {
                    self.rows(dw, dh, |y, row| {
                        for x in 0..dw {
                            let Some((u, v)) = quad.locate(x, y) else {
                                continue;
                            };
                            let px = sample(scaler, &composed, quad.w, quad.h, u, v)
                                .map(|c| table[c as usize]);
                            row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&px);
                        }
                    })
                }
            }
            Combine::Copy if prog.lut.is_some() => {
                check_luts(inputs)?;
                let luts = &inputs[0].luts;
                let dither = if prog.lut == Some(true) {
                    Some(prog.pattern.unwrap_or(DitherMode::None))
                } else {
                    None
                };
                let src_tex = &units[0];
                self.rows(dw, dh, |y, row| {
                    for x in 0..dw {
                        let v = prescale_pixel(src_tex, luts, dither, retrace, dw, dh, x, y);
                        row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&v);
                    }
                })
            }
            Combine::Copy
            | Combine::Lerp { .. }
            | Combine::Deflicker { .. }
            | Combine::Edge2x(_) => {
                let scale = dw / src.w.max(1);
                if scale == 0 {
                    return Err(GxError::mismatch("planar draw smaller than its source"));
                }
                let compare = prog.compare;
                let field = frame.field;
                self.rows(dw, dh, |y, row| {
                    for x in 0..dw {
                        let v = planar_pixel(first, compare, &units, scale, field, x, y);
                        row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&v);
                    }
                })
            }
            Combine::Scale(_) => {
                return Err(GxError::mismatch("scale combiner must follow a matrix"));
            }
        };

        store(output, dw, dh, &rgb)
    }
}

fn check_luts(inputs: &[TexView<'_>]) -> GxResult<()> {
    if inputs.iter().any(|v| v.luts.len() < 3) {
        return Err(GxError::mismatch("table lookup on a surface without tables"));
    }
    Ok(())
}

// Scatter an RGB buffer into the target's layout.
fn store(output: &mut Target<'_>, w: u32, h: u32, rgb: &[u8]) -> GxResult<()> {
    match output {
        Target::Frame(f) => {
            if f.width != w || f.height != h {
                return Err(GxError::mismatch(format!(
                    "frame is {}x{}, draw is {w}x{h}",
                    f.width, f.height
                )));
            }
            f.data.copy_from_slice(rgb);
        }
        Target::Surface(s) => store_surface(s, w, h, rgb)?,
    }
    Ok(())
}

fn store_surface(s: &mut Surface, w: u32, h: u32, rgb: &[u8]) -> GxResult<()> {
    if s.width() != w || s.height() != h {
        return Err(GxError::mismatch(format!(
            "'{}' is {}x{}, draw is {w}x{h}",
            s.label(),
            s.width(),
            s.height()
        )));
    }
    let format = s.format();
    let planes = s.planes_mut();
    match (format, planes.len()) {
        (PixelFormat::Rgba8, 1) => {
            for (dst, src) in planes[0].chunks_exact_mut(4).zip(rgb.chunks_exact(3)) {
                dst[..3].copy_from_slice(src);
                dst[3] = 0xFF;
            }
        }
        (PixelFormat::I8 | PixelFormat::Ci8, 3) => {
            for (i, px) in rgb.chunks_exact(3).enumerate() {
                for (c, &v) in px.iter().enumerate() {
                    planes[c][i] = v;
                }
            }
        }
        (f, n) => {
            return Err(GxError::mismatch(format!(
                "cannot draw into {f:?} with {n} planes"
            )));
        }
    }
    Ok(())
}

impl Renderer for SoftwareRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    #[tracing::instrument(skip_all, fields(ops = block.ops().len()))]
    fn execute(
        &mut self,
        block: &CommandBlock,
        inputs: &[TexView<'_>],
        output: &mut Target<'_>,
        frame: FrameParams,
    ) -> GxResult<()> {
        let mut prog = Program::default();
        let mut units = 0usize;
        for op in block.ops() {
            match op {
                Op::Fetch { unit, .. } => {
                    if usize::from(*unit) != units || units >= inputs.len() {
                        return Err(GxError::mismatch(format!(
                            "fetch into unit {unit} with {} views bound",
                            inputs.len()
                        )));
                    }
                    units += 1;
                }
                Op::Lookup(Lookup::Lut { wide }) => prog.lut = Some(*wide),
                Op::Lookup(Lookup::Pattern(mode)) => prog.pattern = Some(*mode),
                Op::Lookup(Lookup::Gamma(g)) => prog.gamma = Some(*g),
                Op::Compare(c) => prog.compare = Some(*c),
                Op::Place(q) => prog.place = Some(*q),
                Op::Combine(c) => prog.combines.push(c),
                Op::Draw { src, dst } => {
                    self.draw(&prog, &inputs[..units], *src, *dst, output, frame)?;
                    prog = Program::default();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/software.rs"]
mod tests;
