/// Email bodies sent to travelers
///
/// Plain text only. Each builder is pure so the wording can be tested
/// without a mail server.

use crate::checkin::{BoardingInfo, CheckInInstant, CheckInQueue, Identity, Passenger};

pub const MANUAL_CHECK_IN_URL: &str = "https://www.southwest.com/air/check-in/index.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

/// Sent once after a reservation is scheduled; times listed soonest first
pub fn scheduled(identity: &Identity, times: &[CheckInInstant]) -> EmailMessage {
    let mut body = format!(
        "Thanks for scheduling a checkin for your flight. I will set my alarm and wake up \
         to check you in 24 hours before your departure.\n\n\
         The boarding position which you receive is based on the number of Early Bird and \
         A-List passengers on your flight. 80% of checkins are in position B15 or better, \
         which almost guarantees you won't be stuck with a middle seat. Enjoy your flight!\n\n\
         Confirmation Number: {}\n\
         Check-in times:\n",
        identity
    );

    let mut sorted = times.to_vec();
    sorted.sort();
    for time in sorted {
        body.push_str(&format!(" - {}\n", time.day_datetime_string()));
    }

    EmailMessage {
        subject: "Your checkin has been scheduled!".to_string(),
        body,
    }
}

/// Convenience for a queue plus the instant already due
pub fn scheduled_from_queue(identity: &Identity, due: Option<CheckInInstant>, remaining: &CheckInQueue) -> EmailMessage {
    let times: Vec<CheckInInstant> = due.into_iter().chain(remaining.iter().copied()).collect();
    scheduled(identity, &times)
}

/// Sent after each successful check-in
pub fn boarding(identity: &Identity, info: &BoardingInfo) -> EmailMessage {
    let mut body = format!(
        "You're checked in! Confirmation #{}\n\n",
        identity
    );

    if info.passes.is_empty() {
        body.push_str("The airline did not return boarding positions. Check the app for your boarding passes.\n");
    } else {
        for pass in &info.passes {
            body.push_str(&format!("{}: {}{}\n", pass.name, pass.group, pass.position));
        }
    }

    body.push_str("\nHave a great flight!\n");

    EmailMessage {
        subject: "You're checked in!".to_string(),
        body,
    }
}

/// Sent when a leg could not be checked in automatically
pub fn failure(identity: &Identity, lead: &Passenger) -> EmailMessage {
    EmailMessage {
        subject: "Error checking in to your flight".to_string(),
        body: format!(
            "Sorry! There was an error checking in to your flight. \
             Please check in to your flight manually to get your boarding passes.\n\n\
             First Name: {}\n\
             Last Name: {}\n\
             Confirmation #{}\n\n\
             {}",
            lead.first_name, lead.last_name, identity, MANUAL_CHECK_IN_URL
        ),
    }
}

/// Sent when the reservation disappears before check-in
pub fn cancelled(identity: &Identity) -> EmailMessage {
    EmailMessage {
        subject: "Your reservation was not found".to_string(),
        body: format!(
            "Reservation {} could not be found when it was time to check in. \
             It may have been cancelled or changed, so no further check-ins are scheduled.\n\n\
             If you still plan to fly, schedule the new reservation or check in manually:\n\
             {}",
            identity, MANUAL_CHECK_IN_URL
        ),
    }
}
