use crate::{ViewId, WiringError};

/// One incoming edge of a view: which predecessor, and which of its outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    pub from: ViewId,
    /// `None` takes every output the predecessor currently has.
    pub select: Option<Vec<usize>>,
}

/// Predecessors given to `connect`
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Inputs {
    /// First step of a pipeline
    #[default]
    None,
    One(ViewId),
    Many(Vec<ViewId>),
}

/// Output selection given to `connect`
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Indices {
    /// Every output of every predecessor
    #[default]
    All,
    /// The same single index from every predecessor
    Single(usize),
    /// With one predecessor: that selection. With several: one index per predecessor.
    Flat(Vec<usize>),
    /// Explicit selection per predecessor; `None` takes everything.
    Nested(Vec<Option<Vec<usize>>>),
}

/// Normalize `inputs`/`indices` into one wire per predecessor.
pub(crate) fn resolve(inputs: Inputs, indices: Indices) -> Result<Vec<Wire>, WiringError> {
    let predecessors = match inputs {
        Inputs::None => Vec::new(),
        Inputs::One(view) => vec![view],
        Inputs::Many(views) => views,
    };
    let count = predecessors.len();

    let selections: Vec<Option<Vec<usize>>> = match indices {
        Indices::All => vec![None; count],
        _ if count == 0 => return Err(WiringError::SelectorWithoutPredecessor),
        Indices::Single(index) => vec![Some(vec![index]); count],
        Indices::Flat(list) if count == 1 => vec![Some(list)],
        Indices::Flat(list) => {
            check_arity(count, list.len())?;
            list.into_iter().map(|index| Some(vec![index])).collect()
        }
        Indices::Nested(lists) => {
            check_arity(count, lists.len())?;
            lists
        }
    };

    for selection in selections.iter().flatten() {
        check_unique(selection)?;
    }

    Ok(predecessors
        .into_iter()
        .zip(selections)
        .map(|(from, select)| Wire { from, select })
        .collect())
}

fn check_arity(predecessors: usize, selectors: usize) -> Result<(), WiringError> {
    if predecessors != selectors {
        return Err(WiringError::ArityMismatch {
            predecessors,
            selectors,
        });
    }
    Ok(())
}

pub(crate) fn check_unique(indices: &[usize]) -> Result<(), WiringError> {
    for (pos, index) in indices.iter().enumerate() {
        if indices[..pos].contains(index) {
            return Err(WiringError::DuplicateIndex { index: *index });
        }
    }
    Ok(())
}

impl From<ViewId> for Inputs {
    fn from(view: ViewId) -> Self {
        Inputs::One(view)
    }
}

impl From<Vec<ViewId>> for Inputs {
    fn from(views: Vec<ViewId>) -> Self {
        Inputs::Many(views)
    }
}

impl From<&[ViewId]> for Inputs {
    fn from(views: &[ViewId]) -> Self {
        Inputs::Many(views.to_vec())
    }
}

impl<const N: usize> From<[ViewId; N]> for Inputs {
    fn from(views: [ViewId; N]) -> Self {
        Inputs::Many(views.to_vec())
    }
}

impl From<usize> for Indices {
    fn from(index: usize) -> Self {
        Indices::Single(index)
    }
}

impl From<Vec<usize>> for Indices {
    fn from(list: Vec<usize>) -> Self {
        Indices::Flat(list)
    }
}

impl<const N: usize> From<[usize; N]> for Indices {
    fn from(list: [usize; N]) -> Self {
        Indices::Flat(list.to_vec())
    }
}

impl From<Vec<Option<Vec<usize>>>> for Indices {
    fn from(lists: Vec<Option<Vec<usize>>>) -> Self {
        Indices::Nested(lists)
    }
}

impl From<Vec<Vec<usize>>> for Indices {
    fn from(lists: Vec<Vec<usize>>) -> Self {
        Indices::Nested(lists.into_iter().map(Some).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::NodeIndex;

    fn view(i: usize) -> ViewId {
        ViewId(NodeIndex::new(i))
    }

    #[test]
    fn single_predecessor_flat_list_is_one_selection() {
        let wires = resolve(view(0).into(), vec![0, 1].into()).unwrap();
        assert_eq!(
            wires,
            vec![Wire {
                from: view(0),
                select: Some(vec![0, 1])
            }]
        );
    }

    #[test]
    fn several_predecessors_flat_list_is_one_index_each() {
        let wires = resolve([view(0), view(1)].into(), vec![2, 3].into()).unwrap();
        assert_eq!(wires[0].select, Some(vec![2]));
        assert_eq!(wires[1].select, Some(vec![3]));
    }

    #[test]
    fn single_index_applies_to_every_predecessor() {
        let wires = resolve([view(0), view(1)].into(), Indices::Single(1)).unwrap();
        assert!(wires.iter().all(|w| w.select == Some(vec![1])));
    }

    #[test]
    fn rejects_mismatched_and_orphan_selections() {
        assert_eq!(
            resolve([view(0), view(1)].into(), vec![vec![0]].into()),
            Err(WiringError::ArityMismatch {
                predecessors: 2,
                selectors: 1
            })
        );
        assert_eq!(
            resolve(Inputs::None, Indices::Single(0)),
            Err(WiringError::SelectorWithoutPredecessor)
        );
        assert_eq!(
            resolve(view(0).into(), vec![1, 1].into()),
            Err(WiringError::DuplicateIndex { index: 1 })
        );
    }
}
