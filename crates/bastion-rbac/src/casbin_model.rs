use crate::errors::RbacResult;
use casbin::prelude::DefaultModel;

// Exact (role, path, method) match. The super role never reaches the matcher.
const MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = r.sub == p.sub && r.obj == p.obj && r.act == p.act
"#;

pub fn casbin_model_string() -> &'static str {
    MODEL
}

pub async fn casbin_model() -> RbacResult<DefaultModel> {
    Ok(DefaultModel::from_str(MODEL).await?)
}
