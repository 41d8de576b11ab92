//! The experiment designer state machine.

use tracing::{debug, info};

use dp_design::{Design, DesignGenerator};
use dp_model::{build_desirabilities, Desirability, OptimumPredictor};
use dp_types::{
    config_error, not_implemented, validation_error, Criterion, DesignSheet, DesignerConfig,
    DpResult, FactorSpace, OptimizationResult, Phase, ResponseSheet,
};

use crate::evaluate::{evaluate_optimization, evaluate_screening};
use crate::history::RoundRecord;

/// Default polynomial degree of the response model.
pub const DEFAULT_DEGREE: usize = 2;

/// Default convergence tolerance.
pub const DEFAULT_TOL: f64 = 0.25;

/// Drives rounds of design generation and response evaluation.
///
/// A designer starts in the screening phase unless screening is skipped and
/// moves to optimization after the first screening round. Every evaluated
/// round produces a new factor snapshot; earlier snapshots stay available
/// through [`history`](Self::history) and can be restored with
/// [`rollback_to`](Self::rollback_to).
pub struct ExperimentDesigner {
    config: DesignerConfig,
    initial_factors: FactorSpace,
    initial_phase: Phase,
    factors: FactorSpace,
    phase: Phase,
    criterion: Criterion,
    generator: DesignGenerator,
    predictor: OptimumPredictor,
    desirabilities: Option<Vec<(String, Desirability)>>,
    design: Option<Design>,
    history: Vec<RoundRecord>,
}

impl std::fmt::Debug for ExperimentDesigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentDesigner")
            .field("design_type", &self.config.design_type)
            .field("phase", &self.phase)
            .field("factors", &self.factors)
            .field("rounds", &self.history.len())
            .finish()
    }
}

impl ExperimentDesigner {
    /// Validate the configuration and build the initial factor snapshot.
    pub fn new(config: DesignerConfig) -> DpResult<Self> {
        config.validate()?;

        let mut factors = FactorSpace::new();
        for (name, spec) in config.factors.iter() {
            let factor = spec.build()?;
            debug!("Sets factor {}: {}", name, factor);
            factors.insert(name, factor)?;
        }

        let generator =
            DesignGenerator::new(&config.design_type, config.at_edges, config.gsd_reduction)?;

        let desirabilities = if config.responses.len() > 1 {
            Some(build_desirabilities(&config.responses)?)
        } else {
            None
        };
        let criterion = config
            .responses
            .first()
            .map(|(_, spec)| spec.criterion)
            .ok_or_else(|| config_error!("at least one response is required"))?;

        let phase = if config.skip_screening {
            Phase::Optimization
        } else {
            Phase::Screening
        };
        info!(
            "Created experiment designer: {} factors, {} design, starting in {} phase",
            factors.len(),
            generator.design_name(),
            phase
        );

        Ok(Self {
            initial_factors: factors.clone(),
            initial_phase: phase,
            factors,
            phase,
            criterion,
            generator,
            predictor: OptimumPredictor::default(),
            desirabilities,
            design: None,
            history: Vec::new(),
            config,
        })
    }

    /// Replace the model fit and optimum search used in optimization rounds.
    pub fn with_predictor(mut self, predictor: OptimumPredictor) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    pub fn factors(&self) -> &FactorSpace {
        &self.factors
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Desirability functions, present when several responses are configured.
    pub fn desirabilities(&self) -> Option<&[(String, Desirability)]> {
        self.desirabilities.as_deref()
    }

    /// The most recently generated design.
    pub fn current_design(&self) -> Option<&Design> {
        self.design.as_ref()
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    /// Generate the design for the current phase and factor snapshot.
    pub fn new_design(&mut self) -> DpResult<DesignSheet> {
        info!("Generates new {} design", self.phase);
        let design = self.generator.generate(self.phase, &self.factors)?;
        let sheet = design.sheet.clone();
        self.design = Some(design);
        Ok(sheet)
    }

    /// Evaluate measured responses of the current design and update the
    /// factors for the next round.
    ///
    /// `degree` is the polynomial degree of the response model and `tol` the
    /// accepted relative distance of the optimum to the design edges (both
    /// only used in the optimization phase).
    pub fn update_factors_from_response(
        &mut self,
        response: &ResponseSheet,
        degree: usize,
        tol: f64,
    ) -> DpResult<OptimizationResult> {
        if response.n_cols() != 1 {
            return Err(not_implemented!(
                "combining {} responses into one desirability",
                response.n_cols()
            ));
        }
        let design = self
            .design
            .as_ref()
            .ok_or_else(|| validation_error!("no design has been generated yet"))?;
        if response.n_rows() != design.runs() {
            return Err(validation_error!(
                "response has {} rows but the design has {} runs",
                response.n_rows(),
                design.runs()
            ));
        }
        let values = response
            .column_at(0)
            .ok_or_else(|| validation_error!("response sheet has no column"))?;

        let (next, result) = match self.phase {
            Phase::Screening => evaluate_screening(&self.factors, design, values, self.criterion)?,
            Phase::Optimization => evaluate_optimization(
                &self.factors,
                design,
                values,
                self.criterion,
                degree,
                tol,
                self.config.relative_step,
                &self.predictor,
            )?,
        };

        let evaluated = self.phase;
        let runs = design.runs();
        let before = std::mem::replace(&mut self.factors, next);
        self.phase = Phase::Optimization;
        self.history.push(RoundRecord::new(
            self.history.len() + 1,
            evaluated,
            self.phase,
            runs,
            before,
            self.factors.clone(),
            result.clone(),
        ));
        if evaluated == Phase::Screening {
            info!("Screening finished, switching to optimization");
        }
        Ok(result)
    }

    /// Restore the factor snapshot and phase as they were after `round`
    /// rounds; round 0 is the initial state. Later rounds are discarded and
    /// a new design has to be generated.
    pub fn rollback_to(&mut self, round: usize) -> DpResult<()> {
        if round > self.history.len() {
            return Err(validation_error!(
                "cannot roll back to round {}, only {} rounds recorded",
                round,
                self.history.len()
            ));
        }
        let (factors, phase) = match round {
            0 => (self.initial_factors.clone(), self.initial_phase),
            _ => {
                let record = &self.history[round - 1];
                (record.factors_after.clone(), record.next_phase)
            }
        };
        info!("Rolls back to round {} ({} phase)", round, phase);
        self.factors = factors;
        self.phase = phase;
        self.history.truncate(round);
        self.design = None;
        Ok(())
    }

    /// Run one evaluation with the default degree and tolerance.
    pub fn update(&mut self, response: &ResponseSheet) -> DpResult<OptimizationResult> {
        self.update_factors_from_response(response, DEFAULT_DEGREE, DEFAULT_TOL)
    }
}
