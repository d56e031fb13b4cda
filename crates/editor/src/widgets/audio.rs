use note_markup::{Document, NodeId, css_number};

use super::{DELETE_BUTTON_CLASS, PLAYING_CLASS, WIDGET_ATTR, WidgetAction, WidgetCx, WidgetKind, WidgetOutcome};
use crate::config::WidgetLimits;
use crate::error::WidgetError;
use crate::files::{IncomingFile, format_duration, to_data_uri, validate_kind};

pub const AUDIO_CLASS: &str = "note-audio";
pub(super) const TOGGLE_CLASS: &str = "audio-toggle";
pub(super) const SPEED_CLASS: &str = "audio-speed";
const TIME_CLASS: &str = "audio-time";
const DURATION_ATTR: &str = "data-duration";
const SPEED_ATTR: &str = "data-speed";

/// Playback rates in cycling order.
pub const SPEED_STEPS: &[f64] = &[1.0, 1.25, 1.5, 2.0, 0.75];

pub fn next_speed(current: f64) -> f64 {
    SPEED_STEPS
        .iter()
        .position(|&s| (s - current).abs() < f64::EPSILON)
        .map(|ix| SPEED_STEPS[(ix + 1) % SPEED_STEPS.len()])
        .unwrap_or(SPEED_STEPS[0])
}

fn speed_label(speed: f64) -> String {
    format!("{speed}x")
}

/// Builds a detached audio player widget for a finished recording.
pub fn build_audio(
    doc: &mut Document,
    recording: &IncomingFile,
    duration: f64,
    limits: &WidgetLimits,
) -> Result<NodeId, WidgetError> {
    validate_kind(recording, limits.max_file_bytes, "audio")?;
    let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };

    let container = doc.create_element("div");
    doc.set_attr(container, "class", AUDIO_CLASS)?;
    doc.set_attr(container, WIDGET_ATTR, WidgetKind::Audio.as_str())?;
    doc.set_attr(container, DURATION_ATTR, format!("{duration}"))?;
    doc.set_attr(container, SPEED_ATTR, "1")?;
    doc.set_attr(container, "contenteditable", "false")?;

    let audio = doc.create_element("audio");
    doc.set_attr(audio, "src", to_data_uri(recording.mime_or_default(), &recording.bytes))?;
    doc.set_attr(audio, "preload", "metadata")?;

    let toggle = doc.create_element("button");
    doc.set_attr(toggle, "class", TOGGLE_CLASS)?;
    doc.set_attr(toggle, "type", "button")?;

    let time = doc.create_element("span");
    doc.set_attr(time, "class", TIME_CLASS)?;
    let time_text = doc.create_text(format_duration(duration));
    doc.append_child(time, time_text)?;

    let speed = doc.create_element("button");
    doc.set_attr(speed, "class", SPEED_CLASS)?;
    doc.set_attr(speed, "type", "button")?;
    let speed_text = doc.create_text(speed_label(1.0));
    doc.append_child(speed, speed_text)?;

    let delete = doc.create_element("button");
    doc.set_attr(delete, "class", DELETE_BUTTON_CLASS)?;
    doc.set_attr(delete, "type", "button")?;

    for child in [audio, toggle, time, speed, delete] {
        doc.append_child(container, child)?;
    }
    Ok(container)
}

pub(super) fn speed_of(doc: &Document, widget: NodeId) -> f64 {
    doc.attr(widget, SPEED_ATTR)
        .and_then(css_number)
        .filter(|s| *s > 0.0)
        .unwrap_or(1.0)
}

fn duration_of(doc: &Document, widget: NodeId) -> f64 {
    doc.attr(widget, DURATION_ATTR)
        .and_then(css_number)
        .filter(|d| d.is_finite())
        .map_or(0.0, |d| d.max(0.0))
}

fn src_of(doc: &Document, widget: NodeId) -> Option<String> {
    doc.find_first(widget, |d, n| d.is_element(n, "audio"))
        .and_then(|a| doc.attr(a, "src"))
        .map(str::to_string)
}

pub(super) fn play(
    cx: &mut WidgetCx<'_>,
    widget: NodeId,
    _: &WidgetAction,
) -> Result<WidgetOutcome, WidgetError> {
    let src = src_of(cx.doc, widget).unwrap_or_default();
    let rate = speed_of(cx.doc, widget);
    let player = cx.players.ensure(widget, rate);
    if player.playing {
        return Ok(WidgetOutcome::Unchanged);
    }
    player.playing = true;
    cx.media.play(player.id, &src);
    cx.doc.add_class(widget, PLAYING_CLASS)?;
    Ok(WidgetOutcome::Unchanged)
}

pub(super) fn pause(
    cx: &mut WidgetCx<'_>,
    widget: NodeId,
    _: &WidgetAction,
) -> Result<WidgetOutcome, WidgetError> {
    if let Some(player) = cx.players.get_mut(widget)
        && player.playing
    {
        player.playing = false;
        cx.media.pause(player.id);
    }
    cx.doc.remove_class(widget, PLAYING_CLASS)?;
    Ok(WidgetOutcome::Unchanged)
}

/// Seeks within `[0, duration]`. Position is playback state, so nothing is
/// committed.
pub(super) fn seek(
    cx: &mut WidgetCx<'_>,
    widget: NodeId,
    action: &WidgetAction,
) -> Result<WidgetOutcome, WidgetError> {
    let WidgetAction::Seek(requested) = *action else {
        return Ok(WidgetOutcome::Unchanged);
    };
    let duration = duration_of(cx.doc, widget);
    let target = if requested.is_finite() {
        requested.clamp(0.0, duration)
    } else {
        0.0
    };
    let rate = speed_of(cx.doc, widget);
    let player = cx.players.ensure(widget, rate);
    player.position = target;
    cx.media.seek(player.id, target);
    Ok(WidgetOutcome::Unchanged)
}

fn apply_speed(cx: &mut WidgetCx<'_>, widget: NodeId, speed: f64) -> Result<WidgetOutcome, WidgetError> {
    if (speed_of(cx.doc, widget) - speed).abs() < f64::EPSILON {
        return Ok(WidgetOutcome::Unchanged);
    }
    cx.doc.set_attr(widget, SPEED_ATTR, format!("{speed}"))?;
    if let Some(button) = cx.doc.find_by_class(widget, SPEED_CLASS).first().copied() {
        cx.doc.clear_children(button)?;
        let label = cx.doc.create_text(speed_label(speed));
        cx.doc.append_child(button, label)?;
    }
    let player = cx.players.ensure(widget, speed);
    player.rate = speed;
    cx.media.set_rate(player.id, speed);
    Ok(WidgetOutcome::Changed)
}

pub(super) fn cycle_speed(
    cx: &mut WidgetCx<'_>,
    widget: NodeId,
    _: &WidgetAction,
) -> Result<WidgetOutcome, WidgetError> {
    let next = next_speed(speed_of(cx.doc, widget));
    apply_speed(cx, widget, next)
}

pub(super) fn set_speed(
    cx: &mut WidgetCx<'_>,
    widget: NodeId,
    action: &WidgetAction,
) -> Result<WidgetOutcome, WidgetError> {
    let WidgetAction::SetSpeed(speed) = *action else {
        return Ok(WidgetOutcome::Unchanged);
    };
    if !speed.is_finite() || speed <= 0.0 {
        return Ok(WidgetOutcome::Unchanged);
    }
    apply_speed(cx, widget, speed.clamp(0.25, 4.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_cycle_wraps_back_to_normal() {
        let mut speed = 1.0;
        let mut seen = Vec::new();
        for _ in 0..5 {
            speed = next_speed(speed);
            seen.push(speed);
        }
        assert_eq!(seen, vec![1.25, 1.5, 2.0, 0.75, 1.0]);
        assert_eq!(next_speed(3.0), 1.0);
    }
}
