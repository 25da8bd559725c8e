//! 查询结果校验
//!
//! 逐行读取并与期望值比较。行数或内容不符只记为校验失败，不中断后续流程；
//! 读取过程中的数据库错误照常向上传播。

use crate::database::{Row, SqlResult};

/// `location` 表中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub num: i64,
    pub addr: String,
}

impl Location {
    pub fn new(num: i64, addr: impl Into<String>) -> Self {
        Self {
            num,
            addr: addr.into(),
        }
    }

    /// 从 `(num, addr)` 两列的结果行读取
    pub fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(Self {
            num: row.get_int(0)?,
            addr: row.get_string(1)?,
        })
    }
}

/// 插入并更新后，按 `num` 排序应得到的行
pub const EXPECTED_LOCATIONS: [(i64, &str); 2] = [(300, "Lakeshore Ave."), (1910, "Union St.")];

/// 校验结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub failures: Vec<String>,
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, message: String) {
        self.failures.push(message);
    }
}

/// 用 `next` 逐行读取并与 `EXPECTED_LOCATIONS` 比较
///
/// 读完期望的行数后再尝试读取一行，应当没有更多数据。
pub fn verify_locations<F>(next: F) -> SqlResult<Verification>
where
    F: FnMut() -> SqlResult<Option<Location>>,
{
    verify_against(&EXPECTED_LOCATIONS, next)
}

pub fn verify_against<F>(expected: &[(i64, &str)], mut next: F) -> SqlResult<Verification>
where
    F: FnMut() -> SqlResult<Option<Location>>,
{
    let mut verification = Verification::default();

    for (index, (num, addr)) in expected.iter().enumerate() {
        let Some(actual) = next()? else {
            verification.fail(if index == 0 {
                "No rows in ResultSet".to_string()
            } else {
                "Too few rows".to_string()
            });
            return Ok(verification);
        };

        if actual.num != *num {
            verification.fail(format!(
                "Wrong row returned, expected num={}, got {}",
                num, actual.num
            ));
        }
        if actual.addr != *addr {
            verification.fail(format!(
                "Wrong row returned, expected addr={}, got {}",
                addr, actual.addr
            ));
        }
    }

    if next()?.is_some() {
        verification.fail("Too many rows".to_string());
    }

    Ok(verification)
}
