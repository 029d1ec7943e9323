use serde::Serialize;
use together_core::TallySnapshot;

pub const CELEBRATION_IMAGE_URL: &str =
    "https://memegenerator.net/img/instances/67790035/i-think-this-calls-for-a-celebration.jpg";
pub const CELEBRATION_IMAGE_ALT: &str = "I think this calls for a celebration!";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        emoji: Option<bool>,
    },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into(), emoji: None }
    }

    pub fn plain_emoji(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into(), emoji: Some(true) }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text, .. } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessory {
    Image { image_url: String, alt_text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
}

/// A ready-to-post message: notification text plus Block Kit layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// All text the message renders, used for assertions and log previews.
    pub fn rendered_text(&self) -> String {
        if self.blocks.is_empty() {
            return self.fallback_text.clone();
        }
        self.blocks
            .iter()
            .map(|block| match block {
                Block::Section { text, .. } => text.text(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build());
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    block_id: Option<String>,
    text: Option<TextObject>,
    accessory: Option<Accessory>,
}

impl SectionBuilder {
    pub fn block_id(&mut self, block_id: impl Into<String>) -> &mut Self {
        self.block_id = Some(block_id.into());
        self
    }

    pub fn plain_emoji(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain_emoji(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn image(
        &mut self,
        image_url: impl Into<String>,
        alt_text: impl Into<String>,
    ) -> &mut Self {
        self.accessory =
            Some(Accessory::Image { image_url: image_url.into(), alt_text: alt_text.into() });
        self
    }

    fn build(self) -> Block {
        Block::Section {
            block_id: self.block_id,
            text: self.text.unwrap_or_else(|| TextObject::plain("")),
            accessory: self.accessory,
        }
    }
}

/// Nudge for a channel that has gone quiet.
pub fn prompt_message() -> MessageTemplate {
    let text = ":eyes: It\u{2019}s kind of quiet here\u{2026} How is everyone\u{2019}s week going?";
    MessageBuilder::new(text)
        .section(|section| {
            section.plain_emoji(text);
        })
        .build()
}

pub fn weekly_question_message() -> MessageTemplate {
    let text = ":yellow_heart: Hey friends, Happy Monday!! \n:eyes: Our question of the week is: \
                If you could wake up tomorrow having gained any one quality or ability, what \
                would it be? \n :revolving_hearts: React and respond to each other's answers to \
                reach our weekly goal!";
    MessageBuilder::new(text)
        .section(|section| {
            section.plain_emoji(text);
        })
        .build()
}

pub fn congrats_message(tally: &TallySnapshot) -> MessageTemplate {
    let text = format!(
        ":star2:*Congratulations!!!*:star2:\nYour team did a fantastic job building community \
         this week.\nWe sent {} :email: messages and reacted to each other {} times, including \
         {} :blush: positive emotions! :heart:\n*You rock!*:sparkles:\
         :heavy_heart_exclamation_mark_ornament::tada::guitar:",
        tally.messages_sent, tally.reactions_received, tally.positive_reactions_received
    );
    MessageBuilder::new(text.clone())
        .section(|section| {
            section
                .block_id("section567")
                .mrkdwn(text)
                .image(CELEBRATION_IMAGE_URL, CELEBRATION_IMAGE_ALT);
        })
        .build()
}

pub fn fail_message(tally: &TallySnapshot) -> MessageTemplate {
    let text = format!(
        ":confused: We didn't reach our goal this week. Let's try harder next week!\nWe sent {} \
         :email: messages and reacted to each other {} times, including {} :blush: positive \
         emotions! :heart:\n",
        tally.messages_sent, tally.reactions_received, tally.positive_reactions_received
    );
    MessageBuilder::new(text.clone())
        .section(|section| {
            section.plain_emoji(text);
        })
        .build()
}

/// Plain conversational reply without blocks.
pub fn text_message(text: impl Into<String>) -> MessageTemplate {
    MessageBuilder::new(text).build()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use together_core::TallySnapshot;

    use super::{
        congrats_message, fail_message, prompt_message, text_message, weekly_question_message,
        CELEBRATION_IMAGE_URL,
    };

    fn sample_tally() -> TallySnapshot {
        TallySnapshot { messages_sent: 12, reactions_received: 7, positive_reactions_received: 3 }
    }

    #[test]
    fn congrats_embeds_live_counts_and_image() {
        let message = congrats_message(&sample_tally());
        let rendered = message.rendered_text();

        assert!(rendered.contains("We sent 12 :email: messages"));
        assert!(rendered.contains("reacted to each other 7 times"));
        assert!(rendered.contains("including 3 :blush:"));

        let value = serde_json::to_value(&message.blocks).expect("serialize blocks");
        assert_eq!(value[0]["type"], "section");
        assert_eq!(value[0]["block_id"], "section567");
        assert_eq!(value[0]["text"]["type"], "mrkdwn");
        assert_eq!(
            value[0]["accessory"],
            json!({
                "type": "image",
                "image_url": CELEBRATION_IMAGE_URL,
                "alt_text": "I think this calls for a celebration!"
            })
        );
    }

    #[test]
    fn fail_embeds_live_counts_as_plain_text() {
        let message = fail_message(&sample_tally());
        let rendered = message.rendered_text();

        assert!(rendered.starts_with(":confused: We didn't reach our goal this week."));
        assert!(rendered.contains("12"));
        assert!(rendered.contains("7"));
        assert!(rendered.contains("3"));

        let value = serde_json::to_value(&message.blocks).expect("serialize blocks");
        assert_eq!(value[0]["text"]["type"], "plain_text");
        assert_eq!(value[0]["text"]["emoji"], true);
        assert!(value[0].get("accessory").is_none());
        assert!(value[0].get("block_id").is_none());
    }

    #[test]
    fn static_templates_are_single_plain_sections() {
        for message in [prompt_message(), weekly_question_message()] {
            assert_eq!(message.blocks.len(), 1);
            let value = serde_json::to_value(&message.blocks).expect("serialize blocks");
            assert_eq!(value[0]["text"]["type"], "plain_text");
        }
        assert!(prompt_message().rendered_text().contains("kind of quiet here"));
        assert!(weekly_question_message().rendered_text().contains("question of the week"));
    }

    #[test]
    fn text_message_has_no_blocks() {
        let message = text_message("Ok, hope you have a great week!");

        assert!(message.blocks.is_empty());
        assert_eq!(message.rendered_text(), "Ok, hope you have a great week!");
    }
}
