pub mod property;

pub use property::{
    BalanceResponse, EventListParams, EventListResponse, EventResponse, MonthlyReportEventResponse,
    MonthlyReportParams, MonthlyReportResponse, SaveEventRequest,
};
