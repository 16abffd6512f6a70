//! 时间处理工具模块
//!
//! 提供统一的时间戳生成与耗时分桶功能
//!
//! # 设计原则
//!
//! - **存储层**: 所有时间字段使用 UTC 毫秒时间戳（i64）
//! - **业务层**: 统一使用 `Utc::now().timestamp_millis()` 生成时间
//! - **显示层**: 分桶结果为枚举，不包含硬编码文本，由应用层处理国际化

use chrono::Utc;

/// "距上次同步" 的显示分桶
///
/// 规则：不足 1 分钟 → `JustNow`，不足 60 分钟 → `Minutes`，其余 → `Hours`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAge {
    /// 刚刚（< 1 分钟）
    JustNow,
    /// N 分钟前（1 ~ 59 分钟）
    Minutes(i64),
    /// N 小时前（>= 60 分钟）
    Hours(i64),
}

impl SyncAge {
    /// 默认英文文案（应用层可自行国际化）
    pub fn to_label(self) -> String {
        match self {
            SyncAge::JustNow => "just now".to_string(),
            SyncAge::Minutes(m) => format!("{}m ago", m),
            SyncAge::Hours(h) => format!("{}h ago", h),
        }
    }
}

/// 时间格式化工具
pub struct TimeFormatter;

impl TimeFormatter {
    /// 获取当前 UTC 毫秒时间戳
    pub fn now_utc_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// 获取时间差（秒）
    ///
    /// # 参数
    ///
    /// * `utc_timestamp_ms` - UTC 毫秒时间戳
    ///
    /// # 返回
    ///
    /// 距离现在的秒数（正数表示过去，负数表示未来）
    pub fn seconds_since(utc_timestamp_ms: i64) -> i64 {
        let now = Utc::now().timestamp_millis();
        (now - utc_timestamp_ms) / 1000
    }

    /// 获取时间差（分钟）
    pub fn minutes_since(utc_timestamp_ms: i64) -> i64 {
        Self::seconds_since(utc_timestamp_ms) / 60
    }

    /// 获取时间差（小时）
    pub fn hours_since(utc_timestamp_ms: i64) -> i64 {
        Self::seconds_since(utc_timestamp_ms) / 3600
    }

    /// 将 "距上次同步" 的耗时分桶
    ///
    /// # 参数
    ///
    /// * `utc_timestamp_ms` - 上次同步的 UTC 毫秒时间戳
    pub fn bucket_since(utc_timestamp_ms: i64) -> SyncAge {
        Self::bucket_elapsed_secs(Self::seconds_since(utc_timestamp_ms))
    }

    /// 按已经过的秒数分桶（与当前时间无关，便于测试）
    pub fn bucket_elapsed_secs(elapsed_secs: i64) -> SyncAge {
        if elapsed_secs < 60 {
            SyncAge::JustNow
        } else if elapsed_secs < 3600 {
            SyncAge::Minutes(elapsed_secs / 60)
        } else {
            SyncAge::Hours(elapsed_secs / 3600)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_utc_millis() {
        let timestamp = TimeFormatter::now_utc_millis();
        assert!(timestamp > 0);
    }

    #[test]
    fn test_time_calculations() {
        let now = TimeFormatter::now_utc_millis();
        let five_min_ago = now - (5 * 60 * 1000);

        let minutes = TimeFormatter::minutes_since(five_min_ago);
        assert_eq!(minutes, 5);

        let seconds = TimeFormatter::seconds_since(five_min_ago);
        assert_eq!(seconds, 300);
    }

    #[test]
    fn test_bucket_boundaries() {
        // 分桶边界：59 秒属于 JustNow，60 秒属于 Minutes
        assert_eq!(TimeFormatter::bucket_elapsed_secs(0), SyncAge::JustNow);
        assert_eq!(TimeFormatter::bucket_elapsed_secs(59), SyncAge::JustNow);
        assert_eq!(TimeFormatter::bucket_elapsed_secs(60), SyncAge::Minutes(1));
        assert_eq!(
            TimeFormatter::bucket_elapsed_secs(59 * 60),
            SyncAge::Minutes(59)
        );
        assert_eq!(TimeFormatter::bucket_elapsed_secs(3600), SyncAge::Hours(1));
        assert_eq!(
            TimeFormatter::bucket_elapsed_secs(5 * 3600 + 120),
            SyncAge::Hours(5)
        );
    }

    #[test]
    fn test_bucket_since() {
        let now = TimeFormatter::now_utc_millis();
        assert_eq!(TimeFormatter::bucket_since(now), SyncAge::JustNow);

        let ten_min_ago = now - (10 * 60 * 1000);
        assert_eq!(TimeFormatter::bucket_since(ten_min_ago), SyncAge::Minutes(10));

        let two_hours_ago = now - (2 * 3600 * 1000);
        assert_eq!(TimeFormatter::bucket_since(two_hours_ago), SyncAge::Hours(2));
    }

    #[test]
    fn test_labels() {
        assert_eq!(SyncAge::JustNow.to_label(), "just now");
        assert_eq!(SyncAge::Minutes(3).to_label(), "3m ago");
        assert_eq!(SyncAge::Hours(2).to_label(), "2h ago");
    }
}
