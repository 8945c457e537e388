//! Request and response bodies that are not core types.

use serde::{Deserialize, Serialize};
use spacehub_core::WithdrawalMethod;
use spacehub_types::{Booking, Money};

/// Body of `cancel` and `reject`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: String,
}

/// Body of `POST /hosts/:host_id/withdrawals`; the host comes from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalBody {
    pub amount: Money,
    pub method: WithdrawalMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingList {
    pub bookings: Vec<Booking>,
    pub count: usize,
}
