use crate::chart::Span;

/// Decides the order in which multi-word cells are filled.
///
/// A cell reads only the cells of narrower spans beneath it, so an order is
/// only correct if spans never get narrower along it.
pub trait CellSelector {
  /// Every cell of width >= 2 for a sentence of `size` words, in visiting order
  fn cells(&self, size: usize) -> Vec<Span>;
}

/// Bottom-up: increasing width, then increasing start
#[derive(Debug, Default, Copy, Clone)]
pub struct SpanOrder;

impl CellSelector for SpanOrder {
  fn cells(&self, size: usize) -> Vec<Span> {
    (2..=size)
      .flat_map(|width| (0..=size - width).map(move |start| Span::new(start, start + width)))
      .collect()
  }
}

/// Increasing width, then decreasing start. Siblings of one width never
/// read each other, so this fills the same chart as `SpanOrder`.
#[derive(Debug, Default, Copy, Clone)]
pub struct ReverseStartOrder;

impl CellSelector for ReverseStartOrder {
  fn cells(&self, size: usize) -> Vec<Span> {
    (2..=size)
      .flat_map(|width| {
        (0..=size - width)
          .rev()
          .map(move |start| Span::new(start, start + width))
      })
      .collect()
  }
}

/// Whether `cells` never visits a narrower span after a wider one
pub fn is_span_monotone(cells: &[Span]) -> bool {
  cells.windows(2).all(|w| w[0].width() <= w[1].width())
}
