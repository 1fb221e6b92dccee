//! A [`GutterHost`] that prints annotations in a left margin.

use std::{
  fmt::Write as _,
  sync::{Arc, Mutex, PoisonError},
};

use marginalia_core::host::{GutterHost, GutterRegistration, GutterRenderer, LineMapping};

/// Width of the annotation column; matches the renderer's texts.
const GUTTER_WIDTH: usize = 5;

#[derive(Clone, Default)]
pub struct TerminalGutter {
  renderers: Arc<Mutex<Vec<Arc<dyn GutterRenderer>>>>,
}

impl TerminalGutter {
  /// `source` with each line prefixed by its annotation text and 1-based
  /// line number. Highlighted lines are followed by their tooltip.
  pub fn render(&self, source: &str) -> String {
    let renderers = self.renderers.lock().unwrap_or_else(PoisonError::into_inner);
    let mut out = String::new();

    for (index, text) in source.lines().enumerate() {
      let line = index as u32;
      let margin: String = renderers
        .iter()
        .map(|r| r.line_text(line).unwrap_or_else(|| " ".repeat(GUTTER_WIDTH)))
        .collect();
      let _ = writeln!(out, "{margin}{:>5} | {text}", index + 1);

      for renderer in renderers.iter().filter(|r| r.is_highlighted(line)) {
        if let Some(tip) = renderer.tooltip(line) {
          for tip_line in tip.lines() {
            let _ = writeln!(out, "{:width$}      > {tip_line}", "", width = GUTTER_WIDTH);
          }
        }
      }
    }
    out
  }

  pub fn is_empty(&self) -> bool {
    self.renderers.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
  }
}

impl GutterHost for TerminalGutter {
  fn register_text_annotation(
    &mut self,
    _mapping: Arc<dyn LineMapping>,
    renderer: Arc<dyn GutterRenderer>,
  ) -> GutterRegistration {
    let mut renderers = self.renderers.lock().unwrap_or_else(PoisonError::into_inner);
    renderers.push(renderer);
    GutterRegistration(renderers.len() as u64)
  }

  fn deregister_all(&mut self) {
    self.renderers.lock().unwrap_or_else(PoisonError::into_inner).clear();
  }
}
