//! Read access for recorders and privileged write access for stimulation
//! protocols.

use crate::neuro::column::{Column, RK_SLOTS, STATE_DIM, StateVar};
use crate::neuro::noise::NoiseSource;
use crate::neuro::params::{Parameters, Pathway};

impl<N: NoiseSource> Column<N> {
    pub fn value(&self, var: StateVar) -> f64 {
        self.vars[var as usize][0]
    }

    pub fn value_ref(&self, var: StateVar) -> &f64 {
        &self.vars[var as usize][0]
    }

    pub fn snapshot(&self) -> [f64; STATE_DIM] {
        std::array::from_fn(|i| self.vars[i][0])
    }

    /// First variable whose value is NaN or infinite.
    pub fn first_non_finite(&self) -> Option<(StateVar, f64)> {
        StateVar::ALL
            .into_iter()
            .map(|var| (var, self.value(var)))
            .find(|(_, value)| !value.is_finite())
    }

    pub(crate) fn access(&mut self) -> ColumnAccess<'_, N> {
        ColumnAccess { column: self }
    }
}

/// Write handle into a column's internals.
pub(crate) struct ColumnAccess<'a, N: NoiseSource> {
    column: &'a mut Column<N>,
}

impl<N: NoiseSource> ColumnAccess<'_, N> {
    /// Overwrites every slot so the variable stays consistent between steps.
    pub fn set_value(&mut self, var: StateVar, value: f64) {
        self.column.vars[var as usize] = [value; RK_SLOTS];
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.column.params
    }

    pub fn scale_connectivity(&mut self, pathway: Pathway, factor: f64) {
        *self.column.params.connectivity_mut(pathway) *= factor;
    }
}
