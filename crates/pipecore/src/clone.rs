use crate::wiring::Wire;
use crate::{Params, Pipeline, Result, ViewId, WiringError};
use petgraph::visit::{DfsPostOrder, Reversed};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

impl Pipeline {
    /// Views `view` depends on, including itself, predecessors first.
    pub fn subgraph(&self, view: ViewId) -> Result<Vec<ViewId>> {
        self.node(view)?;
        let upstream = Reversed(&self.graph);
        let mut dfs = DfsPostOrder::new(upstream, view.0);

        let mut order = Vec::new();
        while let Some(index) = dfs.next(upstream) {
            order.push(ViewId(index));
        }
        Ok(order)
    }

    /// Clone the subgraph behind `view` and return the clone of `view`.
    ///
    /// The copy shares step instances with the original but has its own
    /// buffers, productions and cache cursors. `overrides` is merged into the
    /// parameters of every cloned view. A view reached along several paths is
    /// cloned once, so fan-out inside the copy behaves like in the original.
    pub fn get_view(&mut self, view: ViewId, overrides: &Params) -> Result<ViewId> {
        let clones = self.clone_subgraph(view, overrides)?;
        clones
            .get(&view)
            .copied()
            .ok_or_else(|| WiringError::UnknownView(view.index()).into())
    }

    /// Clone every view reachable from `view`, keyed by original view.
    pub(crate) fn clone_subgraph(
        &mut self,
        view: ViewId,
        overrides: &Params,
    ) -> Result<HashMap<ViewId, ViewId>> {
        let order = self.subgraph(view)?;
        let mut clones: HashMap<ViewId, ViewId> = HashMap::with_capacity(order.len());

        for original in order {
            let node = self.node(original)?;
            let wires = node
                .inputs
                .iter()
                .map(|wire| {
                    let from = clones
                        .get(&wire.from)
                        .copied()
                        .ok_or(WiringError::UnknownView(wire.from.index()))?;
                    Ok(Wire {
                        from,
                        select: wire.select.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let copy = node.fork(wires.clone().into(), overrides);

            let index = self.graph.add_node(copy);
            for (slot, wire) in wires.iter().enumerate() {
                self.graph.add_edge(wire.from.0, index, slot);
            }
            clones.insert(original, ViewId(index));
        }

        tracing::debug!("Cloned {} views behind {}", clones.len(), view);
        Ok(clones)
    }

    /// Remove `view` and every upstream view that only it depends on.
    ///
    /// Views that still feed something outside the removed set are kept.
    /// Returns the number of views removed. Ids of removed views become
    /// unknown and may later be handed out again.
    pub fn remove_subgraph(&mut self, view: ViewId) -> Result<usize> {
        let order = self.subgraph(view)?;
        if self
            .graph
            .neighbors_directed(view.0, Direction::Outgoing)
            .next()
            .is_some()
        {
            return Err(WiringError::ViewInUse(view.index()).into());
        }

        // consumers come before their predecessors
        let mut removed = HashSet::with_capacity(order.len());
        for candidate in order.into_iter().rev() {
            let orphaned = candidate == view
                || self
                    .graph
                    .neighbors_directed(candidate.0, Direction::Outgoing)
                    .all(|consumer| removed.contains(&ViewId(consumer)));
            if orphaned {
                removed.insert(candidate);
            }
        }

        let count = removed.len();
        self.remove_views(removed);
        tracing::debug!("Removed {} views behind {}", count, view);
        Ok(count)
    }

    /// Drop views created for internal use, such as a drain clone.
    pub(crate) fn remove_views(&mut self, views: impl IntoIterator<Item = ViewId>) {
        for view in views {
            self.graph.remove_node(view.0);
        }
    }
}
