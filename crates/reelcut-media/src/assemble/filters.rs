//! Concatenation graph with crossfades.

use std::fmt::Write as _;

use reelcut_models::DeliveryProfile;

use crate::filters::normalize_portrait;

/// Duration of the final fade to black, in seconds.
pub const FADE_OUT_SECS: f64 = 0.4;

/// Crossfade length actually used: never more than half the shortest clip.
pub fn effective_crossfade(requested: f64, durations: &[f64]) -> f64 {
    let shortest = durations.iter().copied().fold(f64::INFINITY, f64::min);
    if !shortest.is_finite() || requested <= 0.0 {
        return 0.0;
    }
    requested.min(shortest / 2.0).max(0.0)
}

/// Expected duration of the assembled output.
pub fn expected_duration(durations: &[f64], crossfade: f64) -> f64 {
    let total: f64 = durations.iter().sum();
    total - durations.len().saturating_sub(1) as f64 * crossfade
}

/// Build a `filter_complex` joining `durations.len()` inputs into `[vout]`/`[aout]`.
///
/// Input `i` supplies video at `[i:v]`; its audio is `[i:a]` when
/// `has_audio[i]`, otherwise the silent lavfi input at index `silence_input`
/// is trimmed to the clip length.
pub fn concat_graph(
    durations: &[f64],
    has_audio: &[bool],
    crossfade: f64,
    silence_input: usize,
) -> String {
    let n = durations.len();
    let mut graph = String::new();

    let silent_clips = has_audio.iter().filter(|a| !**a).count();
    if silent_clips > 0 {
        let outs: String = (0..silent_clips).map(|k| format!("[sil{}]", k)).collect();
        let _ = write!(graph, "[{}:a]asplit={}{};", silence_input, silent_clips, outs);
    }

    let mut silent_used = 0;
    for (i, duration) in durations.iter().enumerate() {
        let _ = write!(graph, "[{}:v]{},settb=AVTB[v{}];", i, normalize_portrait(), i);
        if has_audio.get(i).copied().unwrap_or(false) {
            let _ = write!(
                graph,
                "[{}:a]aresample={},aformat=sample_fmts=fltp:channel_layouts=stereo,asetpts=PTS-STARTPTS[a{}];",
                i,
                DeliveryProfile::AUDIO_RATE,
                i
            );
        } else {
            let _ = write!(
                graph,
                "[sil{}]atrim=duration={:.3},aformat=sample_fmts=fltp:channel_layouts=stereo,asetpts=PTS-STARTPTS[a{}];",
                silent_used, duration, i
            );
            silent_used += 1;
        }
    }

    // Chain crossfades; each offset is where the next clip begins to overlap.
    let mut v_label = "v0".to_string();
    let mut a_label = "a0".to_string();
    let mut timeline = durations.first().copied().unwrap_or(0.0);
    for i in 1..n {
        let offset = (timeline - crossfade).max(0.0);
        let v_out = format!("vx{}", i);
        let a_out = format!("ax{}", i);
        if crossfade > 0.0 {
            let _ = write!(
                graph,
                "[{}][v{}]xfade=transition=fade:duration={:.3}:offset={:.3}[{}];",
                v_label, i, crossfade, offset, v_out
            );
            let _ = write!(
                graph,
                "[{}][a{}]acrossfade=d={:.3}:c1=tri:c2=tri[{}];",
                a_label, i, crossfade, a_out
            );
        } else {
            let _ = write!(graph, "[{}][v{}]concat=n=2:v=1:a=0[{}];", v_label, i, v_out);
            let _ = write!(graph, "[{}][a{}]concat=n=2:v=0:a=1[{}];", a_label, i, a_out);
        }
        timeline = offset + durations[i];
        v_label = v_out;
        a_label = a_out;
    }

    let fade = FADE_OUT_SECS.min(timeline / 2.0);
    let fade_start = (timeline - fade).max(0.0);
    let _ = write!(
        graph,
        "[{}]fade=t=out:st={:.3}:d={:.3},format={}[vout];[{}]afade=t=out:st={:.3}:d={:.3}[aout]",
        v_label,
        fade_start,
        fade,
        DeliveryProfile::PIX_FMT,
        a_label,
        fade_start,
        fade
    );
    graph
}
