use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::chart::{ChartEdge, Span, cell_index};
use crate::grammar::NonTerminal;
use crate::utils::LOG_ZERO;

struct Entry<'g> {
  span: Span,
  edge: ChartEdge<'g>,
  seq: u64,
}

impl PartialEq for Entry<'_> {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Entry<'_> {}

impl PartialOrd for Entry<'_> {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Entry<'_> {
  /// Higher FOM first; among equal FOMs, earlier pushes first
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .edge
      .fom
      .total_cmp(&other.edge.fom)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

/// Max-priority queue of candidate edges, ordered by figure of merit.
/// Ties pop in insertion order, so search is reproducible.
#[derive(Default)]
pub struct Agenda<'g> {
  heap: BinaryHeap<Entry<'g>>,
  pushed: usize,
}

impl<'g> Agenda<'g> {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn push(&mut self, span: Span, edge: ChartEdge<'g>) {
    let seq = self.pushed as u64;
    self.pushed += 1;
    self.heap.push(Entry { span, edge, seq });
  }

  pub fn pop(&mut self) -> Option<(Span, ChartEdge<'g>)> {
    self.heap.pop().map(|e| (e.span, e.edge))
  }

  pub fn len(&self) -> usize {
    self.heap.len()
  }

  pub fn is_empty(&self) -> bool {
    self.heap.is_empty()
  }

  /// Total pushes over the agenda's lifetime
  pub fn pushed(&self) -> usize {
    self.pushed
  }
}

/// Best FOM ever pushed per `(span, nonterminal)`, for rejecting dominated
/// duplicates before they reach the agenda
pub struct AdmissionMemo {
  size: usize,
  num_nonterminals: usize,
  best: Vec<f32>,
}

impl AdmissionMemo {
  pub fn new(size: usize, num_nonterminals: usize) -> Self {
    Self {
      size,
      num_nonterminals,
      best: vec![LOG_ZERO; size * (size + 1) / 2 * num_nonterminals],
    }
  }

  fn index(&self, span: Span, nt: NonTerminal) -> usize {
    cell_index(self.size, span.start, span.end) * self.num_nonterminals + nt.index()
  }

  pub fn get(&self, span: Span, nt: NonTerminal) -> f32 {
    self.best[self.index(span, nt)]
  }

  /// Records `fom` and returns true if it beats everything pushed for this key so far
  pub fn try_admit(&mut self, span: Span, nt: NonTerminal, fom: f32) -> bool {
    let idx = self.index(span, nt);
    if fom > self.best[idx] {
      self.best[idx] = fom;
      true
    } else {
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::Grammar;

  #[test]
  fn test_agenda_pops_best_then_oldest() {
    let g: Grammar = r#"A -> "a"; B -> "b"; C -> "c";"#.parse().unwrap();
    let edge = |w: &str, fom: f32| ChartEdge::lexical(&g.lexical_productions(g.token(w))[0]).with_fom(fom);

    let mut agenda = Agenda::new();
    agenda.push(Span::new(0, 1), edge("a", -2.0));
    agenda.push(Span::new(1, 2), edge("b", -1.0));
    agenda.push(Span::new(2, 3), edge("c", -2.0));
    assert_eq!(agenda.len(), 3);

    let order = std::iter::from_fn(|| agenda.pop())
      .map(|(span, _)| span.start)
      .collect::<Vec<_>>();
    assert_eq!(order, vec![1, 0, 2]);
    assert!(agenda.is_empty());
    assert_eq!(agenda.pushed(), 3);
  }

  #[test]
  fn test_memo_requires_strict_improvement() {
    let mut memo = AdmissionMemo::new(3, 2);
    let (span, nt) = (Span::new(1, 3), NonTerminal(1));

    assert_eq!(memo.get(span, nt), LOG_ZERO);
    assert!(!memo.try_admit(span, nt, LOG_ZERO));
    assert!(memo.try_admit(span, nt, -4.0));
    assert!(!memo.try_admit(span, nt, -4.0));
    assert!(!memo.try_admit(span, nt, -5.0));
    assert!(memo.try_admit(span, nt, -3.0));
    // other keys are independent
    assert!(memo.try_admit(span, NonTerminal(0), -9.0));
    assert!(memo.try_admit(Span::new(0, 3), nt, -9.0));
  }
}
