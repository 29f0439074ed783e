//! Member model as seen by circulation

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: i32,
    pub member_code: String,
    pub full_name: String,
    pub email: Option<String>,
    pub is_active: bool,
}

/// Short member representation embedded in borrow records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberShort {
    pub member_id: i32,
    pub member_code: String,
    pub full_name: String,
    pub email: Option<String>,
}

impl From<&Member> for MemberShort {
    fn from(member: &Member) -> Self {
        MemberShort {
            member_id: member.id,
            member_code: member.member_code.clone(),
            full_name: member.full_name.clone(),
            email: member.email.clone(),
        }
    }
}
