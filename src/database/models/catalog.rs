use super::entity::{EntityDescriptor, FieldDescriptor};

pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

pub static M_BIODATA: EntityDescriptor = EntityDescriptor {
    name: "m_biodata",
    table: "m_biodata",
    fields: &[
        FieldDescriptor::text("fullname", "fullname", 255),
        FieldDescriptor::text("mobilePhone", "mobile_phone", 15),
        FieldDescriptor::binary("image", "image"),
        FieldDescriptor::text("imagePath", "image_path", 255),
    ],
    required_authority: None,
};

pub static M_NOTES: EntityDescriptor = EntityDescriptor {
    name: "m_notes",
    table: "m_notes",
    fields: &[
        FieldDescriptor::text("title", "title", 200),
        FieldDescriptor::long_text("content", "content"),
    ],
    required_authority: None,
};

pub static M_ROLE: EntityDescriptor = EntityDescriptor {
    name: "m_role",
    table: "m_role",
    fields: &[
        FieldDescriptor::text("name", "name", 20),
        FieldDescriptor::text("code", "code", 20),
        FieldDescriptor::number("level", "level"),
    ],
    required_authority: Some(ROLE_ADMIN),
};

pub static M_USER: EntityDescriptor = EntityDescriptor {
    name: "m_user",
    table: "m_user",
    fields: &[
        FieldDescriptor::number("biodataId", "biodata_id"),
        FieldDescriptor::number("roleId", "role_id"),
        FieldDescriptor::text("email", "email", 100).email(),
        FieldDescriptor::text("password", "password", 255).digest(),
        FieldDescriptor::number("loginAttempt", "login_attempt"),
        FieldDescriptor::boolean("isLocked", "is_locked"),
        FieldDescriptor::timestamp("lastLogin", "last_login"),
    ],
    required_authority: Some(ROLE_ADMIN),
};

pub static T_RESET_PASSWORD: EntityDescriptor = EntityDescriptor {
    name: "t_reset_password",
    table: "t_reset_password",
    fields: &[
        FieldDescriptor::text("oldPassword", "old_password", 255),
        FieldDescriptor::text("newPassword", "new_password", 255),
        FieldDescriptor::text("resetFor", "reset_for", 20),
    ],
    required_authority: None,
};

pub static T_TOKEN: EntityDescriptor = EntityDescriptor {
    name: "t_token",
    table: "t_token",
    fields: &[
        FieldDescriptor::text("email", "email", 100).email(),
        FieldDescriptor::number("userId", "user_id"),
        FieldDescriptor::text("token", "token", 50),
        FieldDescriptor::timestamp("expiredOn", "expired_on"),
        FieldDescriptor::boolean("isExpired", "is_expired"),
        FieldDescriptor::text("usedFor", "used_for", 20),
    ],
    required_authority: None,
};

pub static ENTITIES: [&EntityDescriptor; 6] =
    [&M_BIODATA, &M_NOTES, &M_ROLE, &M_USER, &T_RESET_PASSWORD, &T_TOKEN];

pub fn find(name: &str) -> Option<&'static EntityDescriptor> {
    ENTITIES.iter().copied().find(|d| d.name == name)
}
