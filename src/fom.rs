use std::fmt;
use std::str::FromStr;

use crate::Err;
use crate::chart::{ChartEdge, Span};
use crate::grammar::{Children, Grammar, NonTerminal};
use crate::utils::{LOG_ONE, log_sum_all};

/// Scores a candidate edge for pruned search.
///
/// Implementations must be pure, and for a fixed span and nonterminal must
/// not decrease as the inside score grows. Cells keyed on FOM rely on this
/// to keep unary chains acyclic.
pub trait FigureOfMerit {
  fn score(&self, span: Span, edge: &ChartEdge<'_>) -> f32;
}

/// The inside score alone. Pruned search with this FOM and unbounded beams
/// finds the same optimum as exhaustive search.
#[derive(Debug, Default, Copy, Clone)]
pub struct InsideFom;

impl FigureOfMerit for InsideFom {
  fn score(&self, _span: Span, edge: &ChartEdge<'_>) -> f32 {
    edge.inside
  }
}

/// Inside score plus a per-nonterminal outside estimate: the log of the total
/// weight of rules that use the nonterminal as a child, capped at zero. The
/// start symbol is estimated as certain.
#[derive(Debug, Clone)]
pub struct PriorFom {
  priors: Vec<f32>,
}

impl PriorFom {
  pub fn from_grammar(g: &Grammar) -> Self {
    let mut uses = vec![Vec::new(); g.num_nonterminals()];
    let unary = (0..g.num_nonterminals() as u32)
      .flat_map(|c| g.unary_productions_with_child(NonTerminal(c)));
    for p in unary.chain(g.binary_productions()) {
      match p.children {
        Children::Unary(c) => uses[c.index()].push(p.score),
        Children::Binary(l, r) => {
          uses[l.index()].push(p.score);
          uses[r.index()].push(p.score);
        }
        Children::Lexical(_) => {}
      }
    }

    let mut priors = uses
      .into_iter()
      .map(|scores| log_sum_all(scores).min(LOG_ONE))
      .collect::<Vec<_>>();
    priors[g.start_symbol().index()] = LOG_ONE;

    Self { priors }
  }

  pub fn prior(&self, nt: NonTerminal) -> f32 {
    self.priors[nt.index()]
  }
}

impl FigureOfMerit for PriorFom {
  fn score(&self, _span: Span, edge: &ChartEdge<'_>) -> f32 {
    edge.inside + self.prior(edge.parent())
  }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FomKind {
  #[default]
  Inside,
  Prior,
}

impl FomKind {
  pub fn build<'g>(self, g: &'g Grammar) -> Box<dyn FigureOfMerit + 'g> {
    match self {
      Self::Inside => Box::new(InsideFom),
      Self::Prior => Box::new(PriorFom::from_grammar(g)),
    }
  }
}

impl FromStr for FomKind {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "inside" => Ok(Self::Inside),
      "prior" => Ok(Self::Prior),
      _ => Err(format!("unknown figure of merit {:?} (expected inside or prior)", s).into()),
    }
  }
}

impl fmt::Display for FomKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Inside => write!(f, "inside"),
      Self::Prior => write!(f, "prior"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_prior_fom() {
    let g: Grammar = r#"
      S -> NP VP : -0.1;
      NP -> N : -0.5;
      VP -> V NP : -2.0;
      X -> "orphan";
      N -> "dogs";
      V -> "chase";
    "#
    .parse()
    .unwrap();
    let nt = |s: &str| g.nonterminal(s).unwrap();
    let fom = PriorFom::from_grammar(&g);

    assert_eq!(fom.prior(nt("S")), LOG_ONE);
    // NP is a child of S -> NP VP and VP -> V NP
    let expected = ((-0.1f32).exp() + (-2.0f32).exp()).ln().min(0.0);
    assert!((fom.prior(nt("NP")) - expected).abs() < 1e-6);
    assert_eq!(fom.prior(nt("N")), -0.5);
    assert_eq!(fom.prior(nt("X")), f32::NEG_INFINITY);

    let lexical = &g.lexical_productions(g.token("dogs"))[0];
    let edge = ChartEdge::lexical(lexical);
    assert_eq!(fom.score(Span::new(0, 1), &edge), -0.5);
    assert_eq!(InsideFom.score(Span::new(0, 1), &edge), 0.0);
  }

  #[test]
  fn test_fom_kind_from_str() {
    assert_eq!("prior".parse::<FomKind>().unwrap(), FomKind::Prior);
    assert_eq!(FomKind::Inside.to_string(), "inside");
    assert!("outside".parse::<FomKind>().is_err());
  }
}
