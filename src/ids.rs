use uuid::Uuid;

/// Random 5 character token for making names and emails distinct.
pub fn short_id() -> String {
    short_id_of(5)
}

pub fn short_id_of(len: usize) -> String {
    let len = len.clamp(1, 32);
    Uuid::new_v4().simple().to_string()[..len].to_string()
}
