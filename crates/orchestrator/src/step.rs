//! Saga step set.

use serde::{Deserialize, Serialize};

/// The most recently entered step of a saga, kept for diagnosis and for
/// dispatching release events to the right sub-machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStep {
    // Forward path.
    CreditReservation,
    VehicleReservation,
    PaymentCodeGeneration,
    PaymentProcessing,
    MarkVehicleAsSold,
    SagaComplete,

    // Compensation.
    VehicleRelease,
    CreditRelease,
    CompensationComplete,
    PaymentRefund,

    // Cancellation.
    CancellationVehicleRelease,
    CancellationCreditRelease,
    CancellationComplete,

    // Failure markers.
    CreditReservationFailed,
    MarkVehicleAsSoldFailed,
    PaymentRefundFailed,
}

/// Which reverse operation a cancellation must start with, given the step
/// the saga was at when the request arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationRoute {
    /// Nothing but credit is held yet.
    ReleaseCredit,
    /// A vehicle (and credit) is held.
    ReleaseVehicle,
    /// The purchase is too far along to unwind.
    TooAdvanced,
}

impl SagaStep {
    /// Maps a forward step to its cancellation route.
    ///
    /// Only forward steps are routable; a saga already compensating or
    /// cancelling never reaches this dispatch.
    pub fn cancellation_route(&self) -> CancellationRoute {
        match self {
            SagaStep::CreditReservation => CancellationRoute::ReleaseCredit,
            SagaStep::VehicleReservation
            | SagaStep::PaymentCodeGeneration
            | SagaStep::PaymentProcessing => CancellationRoute::ReleaseVehicle,
            _ => CancellationRoute::TooAdvanced,
        }
    }

    /// Returns the step name as it appears on the wire and in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::CreditReservation => "CREDIT_RESERVATION",
            SagaStep::VehicleReservation => "VEHICLE_RESERVATION",
            SagaStep::PaymentCodeGeneration => "PAYMENT_CODE_GENERATION",
            SagaStep::PaymentProcessing => "PAYMENT_PROCESSING",
            SagaStep::MarkVehicleAsSold => "MARK_VEHICLE_AS_SOLD",
            SagaStep::SagaComplete => "SAGA_COMPLETE",
            SagaStep::VehicleRelease => "VEHICLE_RELEASE",
            SagaStep::CreditRelease => "CREDIT_RELEASE",
            SagaStep::CompensationComplete => "COMPENSATION_COMPLETE",
            SagaStep::PaymentRefund => "PAYMENT_REFUND",
            SagaStep::CancellationVehicleRelease => "CANCELLATION_VEHICLE_RELEASE",
            SagaStep::CancellationCreditRelease => "CANCELLATION_CREDIT_RELEASE",
            SagaStep::CancellationComplete => "CANCELLATION_COMPLETE",
            SagaStep::CreditReservationFailed => "CREDIT_RESERVATION_FAILED",
            SagaStep::MarkVehicleAsSoldFailed => "MARK_VEHICLE_AS_SOLD_FAILED",
            SagaStep::PaymentRefundFailed => "PAYMENT_REFUND_FAILED",
        }
    }

    /// Parses a stored step name.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CREDIT_RESERVATION" => SagaStep::CreditReservation,
            "VEHICLE_RESERVATION" => SagaStep::VehicleReservation,
            "PAYMENT_CODE_GENERATION" => SagaStep::PaymentCodeGeneration,
            "PAYMENT_PROCESSING" => SagaStep::PaymentProcessing,
            "MARK_VEHICLE_AS_SOLD" => SagaStep::MarkVehicleAsSold,
            "SAGA_COMPLETE" => SagaStep::SagaComplete,
            "VEHICLE_RELEASE" => SagaStep::VehicleRelease,
            "CREDIT_RELEASE" => SagaStep::CreditRelease,
            "COMPENSATION_COMPLETE" => SagaStep::CompensationComplete,
            "PAYMENT_REFUND" => SagaStep::PaymentRefund,
            "CANCELLATION_VEHICLE_RELEASE" => SagaStep::CancellationVehicleRelease,
            "CANCELLATION_CREDIT_RELEASE" => SagaStep::CancellationCreditRelease,
            "CANCELLATION_COMPLETE" => SagaStep::CancellationComplete,
            "CREDIT_RESERVATION_FAILED" => SagaStep::CreditReservationFailed,
            "MARK_VEHICLE_AS_SOLD_FAILED" => SagaStep::MarkVehicleAsSoldFailed,
            "PAYMENT_REFUND_FAILED" => SagaStep::PaymentRefundFailed,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_routes() {
        assert_eq!(
            SagaStep::CreditReservation.cancellation_route(),
            CancellationRoute::ReleaseCredit
        );
        assert_eq!(
            SagaStep::VehicleReservation.cancellation_route(),
            CancellationRoute::ReleaseVehicle
        );
        assert_eq!(
            SagaStep::PaymentCodeGeneration.cancellation_route(),
            CancellationRoute::ReleaseVehicle
        );
        assert_eq!(
            SagaStep::PaymentProcessing.cancellation_route(),
            CancellationRoute::ReleaseVehicle
        );
        assert_eq!(
            SagaStep::MarkVehicleAsSold.cancellation_route(),
            CancellationRoute::TooAdvanced
        );
        assert_eq!(
            SagaStep::SagaComplete.cancellation_route(),
            CancellationRoute::TooAdvanced
        );
    }

    #[test]
    fn wire_name_roundtrip() {
        let all = [
            SagaStep::CreditReservation,
            SagaStep::VehicleReservation,
            SagaStep::PaymentCodeGeneration,
            SagaStep::PaymentProcessing,
            SagaStep::MarkVehicleAsSold,
            SagaStep::SagaComplete,
            SagaStep::VehicleRelease,
            SagaStep::CreditRelease,
            SagaStep::CompensationComplete,
            SagaStep::PaymentRefund,
            SagaStep::CancellationVehicleRelease,
            SagaStep::CancellationCreditRelease,
            SagaStep::CancellationComplete,
            SagaStep::CreditReservationFailed,
            SagaStep::MarkVehicleAsSoldFailed,
            SagaStep::PaymentRefundFailed,
        ];
        for step in all {
            assert_eq!(SagaStep::parse(step.as_str()), Some(step));
            let json = serde_json::to_string(&step).unwrap();
            let back: SagaStep = serde_json::from_str(&json).unwrap();
            assert_eq!(back, step);
        }
    }
}
