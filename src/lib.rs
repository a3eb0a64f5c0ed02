#[macro_use]
extern crate lazy_static;

pub mod agenda;
pub mod beam;
pub mod best_first;
pub mod chart;
pub mod exhaustive;
pub mod fom;
pub mod grammar;
pub mod lookup;
pub mod parse_grammar;
pub mod parser;
pub mod rules;
pub mod syntree;
pub mod traversal;
pub mod utils;

pub use crate::grammar::Grammar;
pub use crate::parser::{ChartParser, Parse, ParserConfig, Strategy};
pub use crate::utils::Err;

#[cfg(test)]
const NEWS_GRAMMAR: &str = r#"
  TOP -> S . : 0;
  S -> NP VP : -0.3;
  NP -> DT NN : -0.9;
  NP -> NN : -1.4;
  VP -> AUX ADJP : -1.1;
  VP -> AUX VP : -2.0;
  ADJP -> JJ PP : -1.6;
  ADJP -> JJ ADVP : -0.9;
  ADVP -> RB : -0.2;
  PP -> IN NP : -0.4;
  DT -> "The" : -0.6;
  NNP -> "The" : -6.0;
  NN -> "report" : -4.2;
  VB -> "report" : -5.1;
  AUX -> "is" : -1.3;
  JJ -> "due" : -4.0;
  IN -> "out" : -2.9;
  RB -> "out" : -3.2;
  NN -> "tomorrow" : -4.4;
  . -> "." : -0.1;
"#;

#[test]
fn test_every_strategy_parses_the_news() {
  let g: Grammar = NEWS_GRAMMAR.parse().unwrap();
  let words = "The report is due out tomorrow .".split(' ').collect::<Vec<_>>();
  let expected = "(TOP (S (NP (DT The) (NN report)) (VP (AUX is) (ADJP (JJ due) (PP (IN out) (NP (NN tomorrow)))))) (. .))";

  for strategy in ["exhaustive", "beam", "weak-beam", "agenda"] {
    for lookup in lookup::FillStrategy::ALL {
      let config = ParserConfig {
        strategy: strategy.parse().unwrap(),
        lookup,
        ..Default::default()
      };
      let parse = config.build(&g).parse(&words).unwrap();
      let tree = parse.tree.as_ref().map(|t| t.to_string());
      assert_eq!(tree.as_deref(), Some(expected), "{} / {}", strategy, lookup);
      assert_eq!(
        parse.tree.as_ref().map(|t| t.leaves().len()),
        Some(words.len())
      );
    }
  }
}

#[test]
fn test_unknown_token_is_no_parse() {
  let g: Grammar = NEWS_GRAMMAR.parse().unwrap();
  let words = "The report is overdue out tomorrow .".split(' ').collect::<Vec<_>>();

  for strategy in ["exhaustive", "beam", "weak-beam", "agenda"] {
    let config = ParserConfig {
      strategy: strategy.parse().unwrap(),
      ..Default::default()
    };
    let parser = config.build(&g);
    let parse = parser.parse(&words).unwrap();
    assert!(!parse.is_parsed(), "{}", strategy);
    assert!(parser.parse_chart(&words).unwrap().cell(3, 4).is_empty());
  }
}

#[test]
fn test_re_extraction_is_stable() {
  let g: Grammar = NEWS_GRAMMAR.parse().unwrap();
  let words = "The report is due out tomorrow .".split(' ').collect::<Vec<_>>();
  let parser = ParserConfig::default().build(&g);
  let chart = parser.parse_chart(&words).unwrap();

  let first = chart.extract_best_parse(&g, &words);
  assert!(first.is_some());
  assert_eq!(first, chart.extract_best_parse(&g, &words));
}
