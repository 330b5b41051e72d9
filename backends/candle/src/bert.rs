use candle::{DType, IndexOp, Module, Result, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};

/// Checkpoints are saved either as a bare encoder or wrapped in a task head
fn load_encoder(vb: &VarBuilder, config: &Config) -> Result<BertModel> {
    if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
        BertModel::load(vb.pp("bert"), config)
    } else if vb.contains_tensor("roberta.embeddings.word_embeddings.weight") {
        BertModel::load(vb.pp("roberta"), config)
    } else {
        BertModel::load(vb.clone(), config)
    }
}

/// Bi-encoder with mean pooling over non-padding tokens
pub struct MeanPooledBert {
    bert: BertModel,
}

impl MeanPooledBert {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        Ok(Self {
            bert: load_encoder(&vb, config)?,
        })
    }

    pub fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        let hidden = self
            .bert
            .forward(input_ids, token_type_ids, Some(attention_mask))?;

        let mask = attention_mask.to_dtype(hidden.dtype())?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        summed.broadcast_div(&counts)?.to_dtype(DType::F32)
    }
}

/// Cross-encoder: encoder, optional tanh pooler on the CLS token, single-logit classifier
pub struct BertCrossEncoder {
    bert: BertModel,
    pooler: Option<Linear>,
    classifier: Linear,
}

impl BertCrossEncoder {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let bert = load_encoder(&vb, config)?;
        let hidden_size = config.hidden_size;

        let pooler = if vb.contains_tensor("bert.pooler.dense.weight") {
            Some(candle_nn::linear(
                hidden_size,
                hidden_size,
                vb.pp("bert.pooler.dense"),
            )?)
        } else if vb.contains_tensor("pooler.dense.weight") {
            Some(candle_nn::linear(
                hidden_size,
                hidden_size,
                vb.pp("pooler.dense"),
            )?)
        } else {
            None
        };
        let classifier = candle_nn::linear(hidden_size, 1, vb.pp("classifier"))?;

        Ok(Self {
            bert,
            pooler,
            classifier,
        })
    }

    pub fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        let hidden = self
            .bert
            .forward(input_ids, token_type_ids, Some(attention_mask))?;
        let cls = hidden.i((.., 0))?;

        let cls = match &self.pooler {
            Some(pooler) => pooler.forward(&cls)?.tanh()?,
            None => cls,
        };
        self.classifier
            .forward(&cls)?
            .flatten_all()?
            .to_dtype(DType::F32)
    }
}
