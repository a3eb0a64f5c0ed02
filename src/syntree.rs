use std::fmt;

#[derive(Debug, PartialEq, Clone)]
pub struct Constituent<T> {
  pub value: T,
  pub span: (usize, usize),
}

impl<T> fmt::Display for Constituent<T>
where
  T: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Word<U> {
  pub value: U,
  pub span: (usize, usize),
}

/// A derivation tree. Displays in Penn Treebank bracketing:
/// `(S (NP (DT The) (NN dog)) (VP (VBD barked)))`
#[derive(Debug, PartialEq, Clone)]
pub enum SynTree<T, U> {
  Branch(Constituent<T>, Vec<SynTree<T, U>>),
  Leaf(Word<U>),
}

impl<T, U> SynTree<T, U> {
  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  pub fn span(&self) -> (usize, usize) {
    match self {
      Self::Branch(c, _) => c.span,
      Self::Leaf(w) => w.span,
    }
  }

  pub fn get_branch(&self) -> Option<(&Constituent<T>, &Vec<SynTree<T, U>>)> {
    match self {
      Self::Branch(c, cs) => Some((c, cs)),
      _ => None,
    }
  }

  /// The words under this tree, left to right
  pub fn leaves(&self) -> Vec<&U> {
    match self {
      Self::Leaf(w) => vec![&w.value],
      Self::Branch(_, children) => children.iter().flat_map(|c| c.leaves()).collect(),
    }
  }
}

impl<T, U> fmt::Display for SynTree<T, U>
where
  T: fmt::Display,
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(w) => write!(f, "{}", w.value),
      Self::Branch(c, children) => {
        write!(f, "({}", c.value)?;
        for child in children.iter() {
          write!(f, " {}", child)?;
        }
        write!(f, ")")
      }
    }
  }
}

#[test]
fn test_bracketed_display() {
  let leaf = |w: &str, i: usize| SynTree::Leaf(Word {
    value: w.to_string(),
    span: (i, i + 1),
  });
  let branch = |t: &str, span: (usize, usize), children| {
    SynTree::Branch(
      Constituent {
        value: t.to_string(),
        span,
      },
      children,
    )
  };

  let tree: SynTree<String, String> = branch(
    "NP",
    (0, 2),
    vec![
      branch("DT", (0, 1), vec![leaf("the", 0)]),
      branch("NN", (1, 2), vec![leaf("dog", 1)]),
    ],
  );

  assert_eq!(tree.to_string(), "(NP (DT the) (NN dog))");
  assert_eq!(tree.leaves(), vec!["the", "dog"]);
  assert_eq!(tree.span(), (0, 2));
  assert!(!tree.is_leaf());
  let (cons, children) = tree.get_branch().unwrap();
  assert_eq!(cons.to_string(), "0..2: NP");
  assert!(children.iter().all(|c| !c.is_leaf()));
}
