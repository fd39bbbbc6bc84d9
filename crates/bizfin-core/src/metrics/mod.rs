pub mod aggregates;
pub mod kpis;
pub mod projection;

pub use aggregates::{build_monthly_aggregates, Income, MonthlyAggregate};
pub use kpis::{compute_metrics, Metrics, MetricsInput, Runway};
pub use projection::{
    build_projection, project_all_scenarios, project_scenario, ProjectionInput, ProjectionPoint,
    Scenario,
};
