use tracing::{trace, warn};

use crate::chart::{Chart, Span};
use crate::grammar::Grammar;
use crate::lookup::BinaryLookup;
use crate::parser::{ChartParser, ParseStats};
use crate::traversal::{CellSelector, is_span_monotone};

/// Exhaustive CYK: every binary combination over every midpoint is offered
/// to its parent cell, followed by one unary pass per cell. Finds the exact
/// Viterbi parse. The lookup adapter only changes how fast candidates are found.
pub struct ExhaustiveParser<'g> {
  lookup: Box<dyn BinaryLookup<'g> + 'g>,
  selector: Box<dyn CellSelector + 'g>,
}

impl<'g> ExhaustiveParser<'g> {
  pub fn new(lookup: Box<dyn BinaryLookup<'g> + 'g>, selector: Box<dyn CellSelector + 'g>) -> Self {
    Self { lookup, selector }
  }
}

impl<'g> ChartParser<'g> for ExhaustiveParser<'g> {
  fn grammar(&self) -> &'g Grammar {
    self.lookup.grammar()
  }

  fn fill_chart(&self, chart: &mut Chart<'g>) {
    let cells = self.selector.cells(chart.size());
    if !is_span_monotone(&cells) {
      warn!("cell order narrows between visits; wider cells may be filled from incomplete children");
    }

    let mut stats = ParseStats::default();
    for span in cells {
      let mut cell = chart.check_out(span);

      for mid in span.start + 1..span.end {
        let (left_span, right_span) = (Span::new(span.start, mid), Span::new(mid, span.end));
        let (left, right) = (chart.cell_at(left_span), chart.cell_at(right_span));
        self.lookup.cross(left, right, &mut |p, l, r| {
          stats.considered += 1;
          let inside = p.score + l.inside + r.inside;
          if cell.add(p, inside, Some(left_span), Some(right_span)) {
            stats.added += 1;
          }
        });
      }

      self.add_unary_productions(&mut cell, &mut stats);
      trace!(span = %span, edges = cell.len(), considered = cell.considered(), "filled cell");
      chart.check_in(cell);
    }

    chart.record(stats);
  }
}
