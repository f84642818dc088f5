mod device_view;
mod inspect_view;
mod painter;
mod plan_view;
mod run_view;
mod table;

pub(crate) use self::inspect_view::InspectReportView;
pub(crate) use self::painter::Painter;
pub(crate) use self::plan_view::PlanView;
pub(crate) use self::run_view::RunView;
