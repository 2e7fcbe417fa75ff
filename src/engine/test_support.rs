use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::models::parcel::{ContactInfo, NewParcel};
use crate::models::user::{Actor, PaymentStatus, Role, User};
use crate::state::AppState;

pub fn seeded_state(rider_daily_capacity: u32) -> AppState {
    let config = Config {
        rider_daily_capacity,
        ..Config::default()
    };
    let state = AppState::new(&config);
    state.branches.seed_defaults().unwrap();
    state
}

pub fn branch_id(state: &AppState, name: &str) -> Uuid {
    state
        .branches
        .list()
        .into_iter()
        .find(|branch| branch.branch_name == name)
        .map(|branch| branch.id)
        .unwrap_or_else(|| panic!("no branch named {name}"))
}

/// Inserts a user directly, skipping password hashing.
pub fn user(state: &AppState, name: &str, role: Role, branch: Option<&str>) -> Actor {
    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        password_hash: String::new(),
        role,
        branch_id: branch.map(|name| branch_id(state, name)),
        payment_status: PaymentStatus::Unpaid,
        created_at: Utc::now(),
    };

    state.user_emails.insert(user.email.clone(), user.id);
    state.users.insert(user.id, user.clone());
    Actor::from(&user)
}

pub fn payload(receiver_address: &str) -> NewParcel {
    NewParcel {
        sender_info: ContactInfo {
            name: "Kamal Perera".to_string(),
            address: "21 Galle Road, Colombo 3".to_string(),
            contact: "0711111111".to_string(),
        },
        receiver_info: ContactInfo {
            name: "Nimali Silva".to_string(),
            address: receiver_address.to_string(),
            contact: "0772222222".to_string(),
        },
        weight: Some(2.0),
        parcel_type: Some("Box".to_string()),
        cod_amount: 0.0,
    }
}
