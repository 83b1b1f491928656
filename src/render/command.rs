//! Render command construction.
//!
//! Builds the media tool's argument list for one clip: cut, re-encode,
//! letterbox, optional hook overlay and optional silence compaction via a
//! trim/concat filtergraph.

use crate::config::{Config, HookPosition};

/// Everything one render invocation needs.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    /// Cut start in source time, seconds.
    pub start: f64,
    /// Cut duration in seconds.
    pub duration: f64,
    /// Output pixel width.
    pub width: u32,
    /// Output pixel height.
    pub height: u32,
    /// Hook overlay text, drawn when present.
    pub hook_text: Option<String>,
    /// Clip-local intervals to keep, when silence compaction applies.
    pub keep_intervals: Option<Vec<(f64, f64)>>,
}

impl RenderPlan {
    /// Strip overlays and compaction for the post-deadline retry.
    pub fn stripped(&self) -> Self {
        Self {
            hook_text: None,
            keep_intervals: None,
            ..self.clone()
        }
    }
}

/// Build the full argument list for one render invocation.
pub fn build_args(config: &Config, plan: &RenderPlan, source: &str, output: &str) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        format!("{:.3}", plan.start),
        "-t".to_string(),
        format!("{:.3}", plan.duration),
        "-i".to_string(),
        source.to_string(),
    ];

    let scale_pad = scale_pad_filter(plan.width, plan.height);
    let overlay = plan
        .hook_text
        .as_deref()
        .map(|text| overlay_filter(config, text, plan.height));

    match plan.keep_intervals.as_deref() {
        Some(keeps) if !keeps.is_empty() => {
            let graph = compaction_graph(keeps, &scale_pad, overlay.as_deref());
            args.push("-filter_complex".to_string());
            args.push(graph);
            args.push("-map".to_string());
            args.push("[vout]".to_string());
            args.push("-map".to_string());
            args.push("[aout]".to_string());
        }
        _ => {
            let mut chain = scale_pad;
            if let Some(overlay) = overlay {
                chain.push(',');
                chain.push_str(&overlay);
            }
            args.push("-vf".to_string());
            args.push(chain);
        }
    }

    args.extend([
        "-c:v".to_string(),
        config.hardware.video_codec.clone(),
        "-b:v".to_string(),
        config.render.video_bitrate.clone(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        config.render.audio_bitrate.clone(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string(),
    ]);

    args
}

/// Scale-and-letterbox chain for the target dimensions.
fn scale_pad_filter(width: u32, height: u32) -> String {
    format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=black"
    )
}

/// Hook overlay: a boxed text block for the opening seconds with half-second
/// fades on each edge.
fn overlay_filter(config: &Config, text: &str, height: u32) -> String {
    let escaped = escape_drawtext(text);
    let hold = config.render.hook_duration;
    let fade = 0.5f64;
    let y_expr = match config.render.hook_position {
        HookPosition::Top => format!("{}", height / 8),
        HookPosition::Center => "(h-text_h)/2".to_string(),
        HookPosition::Bottom => format!("h-text_h-{}", height / 8),
    };
    let alpha = format!(
        "if(lt(t,{fade}),t/{fade},if(lt(t,{hold_minus}),1,if(lt(t,{hold}),({hold}-t)/{fade},0)))",
        hold_minus = hold - fade,
    );
    format!(
        "drawtext=text='{escaped}':fontsize={size}:fontcolor={color}:box=1:boxcolor={boxcolor}:\
         boxborderw=18:x=(w-text_w)/2:y={y_expr}:alpha='{alpha}':enable='lt(t,{hold})'",
        size = config.render.hook_font_size,
        color = config.render.hook_font_color,
        boxcolor = config.render.hook_box_color,
    )
}

/// Trim/concat graph removing silence, then the visual chain on the result.
fn compaction_graph(keeps: &[(f64, f64)], scale_pad: &str, overlay: Option<&str>) -> String {
    let mut graph = String::new();
    for (i, (start, end)) in keeps.iter().enumerate() {
        graph.push_str(&format!(
            "[0:v]trim=start={start:.3}:end={end:.3},setpts=PTS-STARTPTS[v{i}];\
             [0:a]atrim=start={start:.3}:end={end:.3},asetpts=PTS-STARTPTS[a{i}];"
        ));
    }
    for i in 0..keeps.len() {
        graph.push_str(&format!("[v{i}][a{i}]"));
    }
    graph.push_str(&format!("concat=n={}:v=1:a=1[vc][aout];", keeps.len()));
    graph.push_str(&format!("[vc]{scale_pad}"));
    if let Some(overlay) = overlay {
        graph.push(',');
        graph.push_str(overlay);
    }
    graph.push_str("[vout]");
    graph
}

/// Escape text for the drawtext filter.
///
/// The filtergraph parser treats backslash, quote, colon, comma, semicolon,
/// brackets, equals and percent specially.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '\'' | ':' | ',' | ';' | '[' | ']' | '=' | '%' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}
