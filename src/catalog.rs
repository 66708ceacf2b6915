//! Operation menus of the six services.

use crate::{
    ids::short_id,
    session::{Bindings, Slot},
    types::{HttpMethod, Operation, Service},
};
use rand::{seq::SliceRandom, Rng};
use serde_json::{json, Value};

const ORDER_STATUSES: &[&str] = &["PREPARING", "OUT_FOR_DELIVERY", "DELIVERED", "CANCELLED"];
const DELIVERY_STATUSES: &[&str] = &["PICKED_UP", "IN_TRANSIT", "DELIVERED"];
const MENU_ITEMS: &[&str] = &["Pizza", "Burger", "Salad"];
const NOTIFICATION_TYPES: &[&str] = &["info", "promo", "alert"];

pub fn operations(service: Service) -> &'static [Operation] {
    match service {
        Service::Users => USERS,
        Service::Restaurants => RESTAURANTS,
        Service::Orders => ORDERS,
        Service::Payments => PAYMENTS,
        Service::Deliveries => DELIVERIES,
        Service::Notifications => NOTIFICATIONS,
    }
}

/// Every operation of every service, in menu order.
pub fn all_operations() -> Vec<&'static Operation> {
    Service::all()
        .iter()
        .flat_map(|svc| svc.operations().iter())
        .collect()
}

fn bound(b: &Bindings, slot: Slot) -> Value {
    b.get(&slot).map_or(Value::Null, |v| Value::String(v.clone()))
}

fn pick(choices: &[&'static str]) -> &'static str {
    choices.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

fn no_body(_: &Bindings) -> Option<Value> {
    None
}

fn unexpected_flag(_: &Bindings) -> Value {
    json!({ "unexpected": true })
}

static USERS: &[Operation] = &[
    Operation {
        service: Service::Users,
        label: "Register User",
        method: HttpMethod::Post,
        path: "/register",
        requires: &[],
        payload: |_| {
            let id = short_id();
            Some(json!({
                "name": format!("User-{}", id),
                "email": format!("user-{}@example.com", id),
            }))
        },
        invalid_payload: |_| json!({ "name": null, "email": 12345 }),
    },
    Operation {
        service: Service::Users,
        label: "Get User",
        method: HttpMethod::Get,
        path: "/{user_id}",
        requires: &[Slot::UserId],
        payload: no_body,
        invalid_payload: unexpected_flag,
    },
];

static RESTAURANTS: &[Operation] = &[
    Operation {
        service: Service::Restaurants,
        label: "List Restaurants",
        method: HttpMethod::Get,
        path: "",
        requires: &[],
        payload: no_body,
        invalid_payload: unexpected_flag,
    },
    Operation {
        service: Service::Restaurants,
        label: "Create Restaurant",
        method: HttpMethod::Post,
        path: "",
        requires: &[],
        payload: |_| {
            let id = short_id();
            Some(json!({
                "name": format!("Resto-{}", id),
                "location": format!("City-{}", id),
            }))
        },
        invalid_payload: |_| json!({ "name": 42, "location": ["nowhere"] }),
    },
    Operation {
        service: Service::Restaurants,
        label: "Get Menu",
        method: HttpMethod::Get,
        path: "/{restaurant_id}/menu",
        requires: &[Slot::RestaurantId],
        payload: no_body,
        invalid_payload: unexpected_flag,
    },
];

static ORDERS: &[Operation] = &[
    Operation {
        service: Service::Orders,
        label: "Create Order",
        method: HttpMethod::Post,
        path: "/create",
        requires: &[Slot::UserId, Slot::RestaurantId],
        payload: |b| {
            let mut items: Vec<&str> = MENU_ITEMS.to_vec();
            items.shuffle(&mut rand::thread_rng());
            items.truncate(rand::thread_rng().gen_range(1..=MENU_ITEMS.len()));
            Some(json!({
                "userId": bound(b, Slot::UserId),
                "restaurantId": bound(b, Slot::RestaurantId),
                "items": items,
            }))
        },
        invalid_payload: |_| json!({ "userId": null, "items": "not-a-list" }),
    },
    Operation {
        service: Service::Orders,
        label: "Get Order",
        method: HttpMethod::Get,
        path: "/{order_id}",
        requires: &[Slot::OrderId],
        payload: no_body,
        invalid_payload: unexpected_flag,
    },
    Operation {
        service: Service::Orders,
        label: "Update Order Status",
        method: HttpMethod::Patch,
        path: "/{order_id}/update_status",
        requires: &[Slot::OrderId],
        payload: |_| Some(json!({ "status": pick(ORDER_STATUSES) })),
        invalid_payload: |_| json!({ "status": 404 }),
    },
];

static PAYMENTS: &[Operation] = &[
    Operation {
        service: Service::Payments,
        label: "Charge Payment",
        method: HttpMethod::Post,
        path: "/charge",
        requires: &[Slot::OrderId],
        payload: |b| {
            let cents: u32 = rand::thread_rng().gen_range(500..10_000);
            Some(json!({
                "orderId": bound(b, Slot::OrderId),
                "amount": f64::from(cents) / 100.0,
            }))
        },
        invalid_payload: |b| json!({ "orderId": bound(b, Slot::OrderId), "amount": "free" }),
    },
    Operation {
        service: Service::Payments,
        label: "Refund Payment",
        method: HttpMethod::Post,
        path: "/refund",
        requires: &[Slot::TransactionId],
        payload: |b| Some(json!({ "transactionId": bound(b, Slot::TransactionId) })),
        invalid_payload: |_| json!({ "transactionId": null }),
    },
    Operation {
        service: Service::Payments,
        label: "Get Transaction",
        method: HttpMethod::Get,
        path: "/{transaction_id}",
        requires: &[Slot::TransactionId],
        payload: no_body,
        invalid_payload: unexpected_flag,
    },
];

static DELIVERIES: &[Operation] = &[
    Operation {
        service: Service::Deliveries,
        label: "Create Delivery",
        method: HttpMethod::Post,
        path: "/create",
        requires: &[Slot::OrderId],
        payload: |b| {
            Some(json!({
                "orderId": bound(b, Slot::OrderId),
                "driverId": format!("driver-{}", short_id()),
            }))
        },
        invalid_payload: |_| json!({ "orderId": 0, "driverId": false }),
    },
    Operation {
        service: Service::Deliveries,
        label: "Update Delivery Status",
        method: HttpMethod::Patch,
        path: "/{delivery_id}/update_status",
        requires: &[Slot::DeliveryId],
        payload: |_| Some(json!({ "status": pick(DELIVERY_STATUSES) })),
        invalid_payload: |_| json!({ "status": ["LOST"] }),
    },
    Operation {
        service: Service::Deliveries,
        label: "Get Delivery",
        method: HttpMethod::Get,
        path: "/{delivery_id}",
        requires: &[Slot::DeliveryId],
        payload: no_body,
        invalid_payload: unexpected_flag,
    },
];

static NOTIFICATIONS: &[Operation] = &[
    Operation {
        service: Service::Notifications,
        label: "Send Notification",
        method: HttpMethod::Post,
        path: "/send",
        requires: &[Slot::UserId],
        payload: |b| {
            Some(json!({
                "userId": bound(b, Slot::UserId),
                "message": format!("Load test ping {}", short_id()),
                "type": pick(NOTIFICATION_TYPES),
            }))
        },
        invalid_payload: |_| json!({ "userId": null, "message": 7, "type": "bogus" }),
    },
    Operation {
        service: Service::Notifications,
        label: "Get User Notifications",
        method: HttpMethod::Get,
        path: "/user/{user_id}",
        requires: &[Slot::UserId],
        payload: no_body,
        invalid_payload: unexpected_flag,
    },
    Operation {
        service: Service::Notifications,
        label: "Mark Notification Read",
        method: HttpMethod::Patch,
        path: "/{notification_id}/read",
        requires: &[Slot::NotificationId],
        payload: no_body,
        invalid_payload: |_| json!({ "read": "maybe" }),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn full_bindings() -> Bindings {
        Slot::all()
            .iter()
            .map(|slot| (*slot, format!("{}-1", slot)))
            .collect()
    }

    #[test]
    fn every_operation_belongs_to_its_menu() {
        for svc in Service::all() {
            assert!(!svc.operations().is_empty());
            assert!(svc.operations().iter().all(|op| op.service == *svc));
        }
        assert_eq!(all_operations().len(), 17);
    }

    #[test]
    fn slugs_are_unique_within_a_service() {
        for svc in Service::all() {
            let mut slugs: Vec<_> = svc.operations().iter().map(Operation::slug).collect();
            slugs.sort();
            slugs.dedup();
            assert_eq!(slugs.len(), svc.operations().len());
        }
    }

    #[test]
    fn placeholders_match_required_slots() {
        let b = full_bindings();
        for op in all_operations() {
            let path = op.resolve_path(&b).unwrap();
            assert!(!path.contains('{'), "{} left a placeholder", op.label);
            for slot in Slot::all() {
                if op.path.contains(&format!("{{{}}}", slot)) {
                    assert!(op.requires.contains(slot), "{} misses {}", op.label, slot);
                }
            }
        }
    }

    #[test]
    fn builders_fill_bound_ids() {
        let b = full_bindings();
        let body = (Service::Orders.find("create-order").unwrap().payload)(&b).unwrap();
        assert_eq!(body["userId"], "user_id-1");
        assert_eq!(body["restaurantId"], "restaurant_id-1");
        let items = body["items"].as_array().unwrap();
        assert!(!items.is_empty() && items.len() <= MENU_ITEMS.len());

        let charge = (Service::Payments.find("charge-payment").unwrap().payload)(&b).unwrap();
        let amount = charge["amount"].as_f64().unwrap();
        assert!((5.0..100.0).contains(&amount));
    }

    #[test]
    fn register_user_uses_fresh_identifiers() {
        let op = Service::Users.find("register-user").unwrap();
        let b = Bindings::new();
        let first = (op.payload)(&b).unwrap();
        let second = (op.payload)(&b).unwrap();
        assert!(first["name"].as_str().unwrap().starts_with("User-"));
        assert!(first["email"].as_str().unwrap().ends_with("@example.com"));
        assert_ne!(first["name"], second["name"]);
    }

    #[test]
    fn invalid_payloads_differ_from_organic_ones() {
        let b = full_bindings();
        for op in all_operations() {
            assert_ne!(Some((op.invalid_payload)(&b)), (op.payload)(&b), "{}", op.label);
        }
    }
}
