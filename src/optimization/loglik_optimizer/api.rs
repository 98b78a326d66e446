//! Entry point: maximize a [`LogLikelihood`] with L-BFGS.
//!
//! Purpose
//! -------
//! Build the L-BFGS solver for the configured line search, wrap the
//! objective in an [`ArgMinAdapter`], run the `argmin` executor, and turn
//! the final state into an [`OptimOutcome`].
//!
//! Key behaviors
//! -------------
//! - `f.check` runs once on the starting point before any solver work.
//! - Gradient and cost tolerances are applied on the solver; `max_iter` on
//!   the executor state.
//! - Start and finish are logged through `tracing` (`debug!` / `info!`).
//!   With the `obs_slog` feature and `verbose`, a terminal observer also
//!   reports every iteration.
//!
//! Conventions
//! -----------
//! - `OptimOutcome::value` is `ℓ(θ̂)`, recovered as the negated best cost.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome},
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Theta,
        },
    },
};
use argmin::{
    core::{CostFunction, Executor, IterState, Solver, State},
    solver::quasinewton::LBFGS,
};
use tracing::{debug, info};

/// Maximize `ℓ(θ)` from `theta0`.
///
/// # Errors
/// - Whatever `f.check` rejects.
/// - Solver construction errors (tolerances `argmin` refuses).
/// - Runtime errors from the executor, including objective errors raised
///   during the run.
/// - Validation errors on the final estimate.
///
/// # Examples
/// ```
/// use ndarray::{Array1, array};
/// use rust_skygrid::optimization::errors::OptResult;
/// use rust_skygrid::optimization::loglik_optimizer::{LogLikelihood, MLEOptions, maximize};
///
/// struct Peak;
/// impl LogLikelihood for Peak {
///     type Data = ();
///     fn value(&self, theta: &Array1<f64>, _: &()) -> OptResult<f64> {
///         Ok(-(theta[0] - 2.0).powi(2))
///     }
///     fn check(&self, _: &Array1<f64>, _: &()) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = maximize(&Peak, array![0.0], &(), &MLEOptions::default())?;
/// assert!((out.theta_hat[0] - 2.0).abs() < 1e-4);
/// # Ok::<(), rust_skygrid::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver: LbfgsMoreThuente = configure(LBFGS::new(MoreThuenteLS::new(), mem), opts)?;
            run(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver: LbfgsHagerZhang = configure(LBFGS::new(HagerZhangLS::new(), mem), opts)?;
            run(theta0, opts, problem, solver)
        }
    }
}

/// Apply the optional gradient and cost tolerances.
fn configure<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &MLEOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(tol) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(tol)?;
    }
    if let Some(tol) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(tol)?;
    }
    Ok(solver)
}

fn run<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, IterState<Theta, Grad, (), (), (), f64>> + Send + 'static,
{
    let dim = theta0.len();
    let initial = -problem.cost(&theta0)?;
    debug!(dim, initial_log_likelihood = initial, "starting L-BFGS");

    let mut executor = Executor::new(problem, solver);
    executor = executor.configure(|state| state.param(theta0));
    if let Some(max_iter) = opts.tols.max_iter {
        executor = executor.configure(|state| state.max_iters(max_iter as u64));
    }
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        executor = executor.add_observer(
            argmin_observer_slog::SlogLogger::term_noblock(),
            argmin::core::observers::ObserverMode::Always,
        );
    }

    let mut state = executor.run()?.state().clone();
    let outcome = OptimOutcome::new(
        state.take_best_param(),
        -state.get_best_cost(),
        state.get_termination_status().clone(),
        state.get_iter(),
        state.get_func_counts().clone(),
        state.take_gradient(),
    )?;
    info!(
        iterations = outcome.iterations,
        log_likelihood = outcome.value,
        converged = outcome.converged,
        status = %outcome.status,
        "L-BFGS finished"
    );
    Ok(outcome)
}
